use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use bookforge_core::{AggregateId, OrderId, UserId};
use bookforge_events::EventEnvelope;
use bookforge_orders::{ClaimCode, OrderEvent, OrderLine, OrderStatus};

use crate::read_model::InMemoryStore;

/// The order repository collaborator: `find_by_id`, `find_by_status`,
/// `find_by_member`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub member_id: UserId,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub total_cents: u64,
    pub discount_cents: u64,
    /// Shown to the owning member only; staff verify against the aggregate.
    pub claim_code: ClaimCode,
    pub placed_at: DateTime<Utc>,
    pub processed_by: Option<UserId>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum OrderProjectionError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),
    #[error("order {0} not yet projected")]
    MissingOrder(OrderId),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug, Default)]
pub struct OrdersProjection {
    store: InMemoryStore<OrderId, OrderReadModel>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl OrdersProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_id(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    pub fn find_by_status(&self, status: OrderStatus) -> Vec<OrderReadModel> {
        self.store.filter(|o| o.status == status)
    }

    pub fn find_by_member(&self, member_id: UserId) -> Vec<OrderReadModel> {
        self.store.filter(|o| o.member_id == member_id)
    }

    pub fn list(&self) -> Vec<OrderReadModel> {
        self.store.list()
    }

    fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        self.cursors
            .read()
            .map(|c| c.get(&aggregate_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn advance_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), OrderProjectionError> {
        if envelope.aggregate_type() != "orders.order" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.cursor(aggregate_id);

        if seq == 0 {
            return Err(OrderProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if last != 0 && seq != last + 1 {
            return Err(OrderProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| OrderProjectionError::Deserialize(e.to_string()))?;

        match ev {
            OrderEvent::Placed(e) => {
                self.store.upsert(
                    e.order_id,
                    OrderReadModel {
                        order_id: e.order_id,
                        member_id: e.member_id,
                        status: OrderStatus::Pending,
                        lines: e.lines,
                        total_cents: e.total_cents,
                        discount_cents: e.discount_cents,
                        claim_code: e.claim_code,
                        placed_at: e.occurred_at,
                        processed_by: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::Confirmed(e) => {
                let mut rm = self
                    .store
                    .get(&e.order_id)
                    .ok_or(OrderProjectionError::MissingOrder(e.order_id))?;
                rm.status = OrderStatus::Confirmed;
                rm.updated_at = e.occurred_at;
                self.store.upsert(e.order_id, rm);
            }
            OrderEvent::Completed(e) => {
                let mut rm = self
                    .store
                    .get(&e.order_id)
                    .ok_or(OrderProjectionError::MissingOrder(e.order_id))?;
                rm.status = OrderStatus::Completed;
                rm.processed_by = Some(e.staff_id);
                rm.updated_at = e.occurred_at;
                self.store.upsert(e.order_id, rm);
            }
            OrderEvent::Cancelled(e) => {
                let mut rm = self
                    .store
                    .get(&e.order_id)
                    .ok_or(OrderProjectionError::MissingOrder(e.order_id))?;
                rm.status = OrderStatus::Cancelled;
                rm.updated_at = e.occurred_at;
                self.store.upsert(e.order_id, rm);
            }
        }

        self.advance_cursor(aggregate_id, seq);
        Ok(())
    }
}
