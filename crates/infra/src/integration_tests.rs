//! Integration tests for the full event-sourced pipeline.
//!
//! Command → EventStore → EventBus → Projection → ReadModel
//!
//! Verifies:
//! - Order commands flow through dispatch into the read model
//! - Exactly one of two competing redemptions can succeed
//! - Duplicate envelope delivery is harmless (idempotent projections)

use std::sync::Arc;

use chrono::Utc;

use bookforge_core::{BookId, ExpectedVersion, OrderId, UserId};
use bookforge_events::{EventBus, EventEnvelope, InMemoryEventBus};
use bookforge_orders::{
    ClaimCode, Order, OrderCommand, OrderLine, OrderStatus, PlaceOrder, RedeemOrder,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use crate::projections::OrdersProjection;

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;

fn setup() -> (CommandDispatcher<Arc<InMemoryEventStore>, Bus>, Arc<InMemoryEventStore>, Bus) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    (CommandDispatcher::new(store.clone(), bus.clone()), store, bus)
}

fn place_command(order_id: OrderId, member_id: UserId, code: &ClaimCode) -> OrderCommand {
    OrderCommand::Place(PlaceOrder {
        order_id,
        member_id,
        lines: vec![
            OrderLine {
                book_id: BookId::new(),
                quantity: 1,
                unit_price_cents: 1999,
            },
            OrderLine {
                book_id: BookId::new(),
                quantity: 1,
                unit_price_cents: 2999,
            },
        ],
        discounts: vec![bookforge_orders::Discount::single(1000)],
        claim_code: code.clone(),
        occurred_at: Utc::now(),
    })
}

#[test]
fn place_then_redeem_flows_into_the_read_model() {
    let (dispatcher, _store, bus) = setup();
    let projection = OrdersProjection::new();

    let order_id = OrderId::new();
    let member_id = UserId::new();
    let staff_id = UserId::new();
    let code = ClaimCode::generate(8);

    let sub = bus.subscribe();

    dispatcher
        .dispatch::<Order>(
            order_id.into(),
            "orders.order",
            place_command(order_id, member_id, &code),
            |id| Order::empty(id.into()),
        )
        .unwrap();

    dispatcher
        .dispatch::<Order>(
            order_id.into(),
            "orders.order",
            OrderCommand::Redeem(RedeemOrder {
                order_id,
                supplied_code: code.as_str().to_string(),
                staff_id,
                occurred_at: Utc::now(),
            }),
            |id| Order::empty(id.into()),
        )
        .unwrap();

    // Drain the bus into the projection.
    while let Ok(env) = sub.try_recv() {
        projection.apply_envelope(&env).unwrap();
    }

    let rm = projection.find_by_id(&order_id).unwrap();
    assert_eq!(rm.status, OrderStatus::Completed);
    assert_eq!(rm.total_cents, 4998);
    assert_eq!(rm.discount_cents, 500);
    assert_eq!(rm.processed_by, Some(staff_id));
    assert_eq!(projection.find_by_status(OrderStatus::Pending).len(), 0);
}

#[test]
fn second_redeem_observes_post_transition_state() {
    let (dispatcher, _store, _bus) = setup();
    let order_id = OrderId::new();
    let code = ClaimCode::generate(8);

    dispatcher
        .dispatch::<Order>(
            order_id.into(),
            "orders.order",
            place_command(order_id, UserId::new(), &code),
            |id| Order::empty(id.into()),
        )
        .unwrap();

    let redeem = OrderCommand::Redeem(RedeemOrder {
        order_id,
        supplied_code: code.as_str().to_string(),
        staff_id: UserId::new(),
        occurred_at: Utc::now(),
    });

    dispatcher
        .dispatch::<Order>(order_id.into(), "orders.order", redeem.clone(), |id| {
            Order::empty(id.into())
        })
        .unwrap();

    // The loser re-reads the stream and finds the order already completed.
    let err = dispatcher
        .dispatch::<Order>(order_id.into(), "orders.order", redeem, |id| {
            Order::empty(id.into())
        })
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition(_)));
}

#[test]
fn interleaved_append_loses_the_version_race() {
    let (dispatcher, store, _bus) = setup();
    let order_id = OrderId::new();
    let code = ClaimCode::generate(8);

    dispatcher
        .dispatch::<Order>(
            order_id.into(),
            "orders.order",
            place_command(order_id, UserId::new(), &code),
            |id| Order::empty(id.into()),
        )
        .unwrap();

    // A writer that loaded version 1 but appends after another writer won.
    let stream = store.load_stream(order_id.into()).unwrap();
    let stale = UncommittedEvent {
        event_id: uuid::Uuid::now_v7(),
        aggregate_id: order_id.into(),
        aggregate_type: "orders.order".to_string(),
        event_type: "orders.order.completed".to_string(),
        event_version: 1,
        occurred_at: Utc::now(),
        payload: stream[0].payload.clone(),
    };

    store
        .append(vec![stale.clone()], ExpectedVersion::Exact(1))
        .unwrap();

    let err = store
        .append(vec![stale], ExpectedVersion::Exact(1))
        .unwrap_err();
    assert!(matches!(
        err,
        crate::event_store::EventStoreError::Concurrency(_)
    ));
}

#[test]
fn duplicate_envelope_delivery_is_idempotent() {
    let (dispatcher, _store, bus) = setup();
    let projection = OrdersProjection::new();
    let order_id = OrderId::new();
    let code = ClaimCode::generate(8);

    let sub = bus.subscribe();
    dispatcher
        .dispatch::<Order>(
            order_id.into(),
            "orders.order",
            place_command(order_id, UserId::new(), &code),
            |id| Order::empty(id.into()),
        )
        .unwrap();

    let env = sub.try_recv().unwrap();
    projection.apply_envelope(&env).unwrap();
    // At-least-once delivery replays the same envelope.
    projection.apply_envelope(&env).unwrap();

    assert_eq!(projection.list().len(), 1);
    assert_eq!(
        projection.find_by_id(&order_id).unwrap().status,
        OrderStatus::Pending
    );
}
