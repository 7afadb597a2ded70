use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use bookforge_auth::Role;
use bookforge_auth::user::UserEvent;
use bookforge_core::{AggregateId, UserId};
use bookforge_events::EventEnvelope;

use crate::read_model::InMemoryStore;

/// The identity repository collaborator: `find_by_id`, `find_by_email`.
///
/// This is the query side handlers read from; they never rehydrate the user
/// aggregate for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub active: bool,
    /// Needed by the login boundary for verification; never serialized out.
    pub password_hash: String,
    /// Member profile counter; zero for staff/admin.
    pub orders_placed: u64,
}

#[derive(Debug, Error)]
pub enum UserProjectionError {
    #[error("failed to deserialize user event: {0}")]
    Deserialize(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

#[derive(Debug, Default)]
pub struct UsersProjection {
    store: InMemoryStore<UserId, UserReadModel>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl UsersProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_id(&self, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(user_id)
    }

    /// Lookup by (normalized) email. Emails are stored lowercase.
    pub fn find_by_email(&self, email: &str) -> Option<UserReadModel> {
        let needle = email.trim().to_lowercase();
        self.store.find(|u| u.email == needle)
    }

    pub fn email_taken(&self, email: &str) -> bool {
        self.find_by_email(email).is_some()
    }

    pub fn list(&self) -> Vec<UserReadModel> {
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
    ) -> Result<(), UserProjectionError> {
        if envelope.aggregate_type() != "identity.user" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.cursor(aggregate_id);

        if seq == 0 {
            return Err(UserProjectionError::NonMonotonicSequence { last, found: seq });
        }
        // Duplicate delivery: already applied, skip.
        if seq <= last {
            return Ok(());
        }
        if last != 0 && seq != last + 1 {
            return Err(UserProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: UserEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| UserProjectionError::Deserialize(e.to_string()))?;

        match ev {
            UserEvent::Registered(e) => {
                let orders_placed = 0;
                self.store.upsert(
                    e.user_id,
                    UserReadModel {
                        user_id: e.user_id,
                        email: e.email,
                        display_name: e.display_name,
                        role: e.role,
                        active: true,
                        password_hash: e.password_hash,
                        orders_placed,
                    },
                );
            }
            UserEvent::ProfileUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.user_id) {
                    rm.display_name = e.display_name;
                    self.store.upsert(e.user_id, rm);
                }
            }
            UserEvent::RoleChanged(e) => {
                if let Some(mut rm) = self.store.get(&e.user_id) {
                    rm.role = e.role;
                    // The counter belongs to the member attribute bundle.
                    if e.role != Role::Member {
                        rm.orders_placed = 0;
                    }
                    self.store.upsert(e.user_id, rm);
                }
            }
            UserEvent::Deactivated(e) => {
                if let Some(mut rm) = self.store.get(&e.user_id) {
                    rm.active = false;
                    self.store.upsert(e.user_id, rm);
                }
            }
            UserEvent::Reactivated(e) => {
                if let Some(mut rm) = self.store.get(&e.user_id) {
                    rm.active = true;
                    self.store.upsert(e.user_id, rm);
                }
            }
            UserEvent::OrderRecorded(e) => {
                if let Some(mut rm) = self.store.get(&e.user_id) {
                    rm.orders_placed += 1;
                    self.store.upsert(e.user_id, rm);
                }
            }
        }

        self.advance_cursor(aggregate_id, seq);
        Ok(())
    }
}
