//! Criterion benchmarks for the request-path hot spots: token validation,
//! the gate decision, and the order dispatch pipeline.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::{Duration, Utc};

use bookforge_auth::{
    ClaimSet, IssuedIdentity, Permission, Role, TokenConfig, TokenIssuer, TokenValidator,
    authorize, catalog, role_claims,
};
use bookforge_core::{BookId, OrderId, SessionId, UserId};
use bookforge_events::{EventEnvelope, InMemoryEventBus};
use bookforge_infra::command_dispatcher::CommandDispatcher;
use bookforge_infra::event_store::InMemoryEventStore;
use bookforge_orders::{ClaimCode, Order, OrderCommand, OrderLine, PlaceOrder, RedeemOrder};

fn bench_token_validation(c: &mut Criterion) {
    let config = TokenConfig::new(
        "0123456789abcdef0123456789abcdef",
        "bookforge",
        "bookforge-clients",
        Duration::hours(72),
    )
    .unwrap();
    let issuer = TokenIssuer::new(config.clone());
    let validator = TokenValidator::new(&config);

    let identity = IssuedIdentity {
        user_id: UserId::new(),
        email: "staff@example.com".to_string(),
        display_name: "Fulfillment Staff".to_string(),
        role: Role::Staff,
        permissions: role_claims(Role::Staff),
    };
    let issued = issuer.issue(&identity, SessionId::new(), Utc::now()).unwrap();

    c.bench_function("token_validate", |b| {
        b.iter(|| validator.validate(black_box(&issued.token)).unwrap())
    });
}

fn bench_gate_decision(c: &mut Criterion) {
    let claims = ClaimSet::new(
        UserId::new(),
        "staff@example.com",
        "Fulfillment Staff",
        Role::Staff,
        role_claims(Role::Staff),
        SessionId::new(),
        Utc::now() + Duration::hours(1),
    );
    let required = Permission::new(catalog::PROCESS_ORDERS);

    c.bench_function("gate_authorize", |b| {
        b.iter(|| authorize(black_box(&claims), black_box(&required)).unwrap())
    });
}

fn bench_place_and_redeem(c: &mut Criterion) {
    c.bench_function("dispatch_place_and_redeem", |b| {
        b.iter(|| {
            let store = Arc::new(InMemoryEventStore::new());
            let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
                Arc::new(InMemoryEventBus::new());
            let dispatcher = CommandDispatcher::new(store, bus);

            let order_id = OrderId::new();
            let code = ClaimCode::generate(8);

            dispatcher
                .dispatch::<Order>(
                    order_id.into(),
                    "orders.order",
                    OrderCommand::Place(PlaceOrder {
                        order_id,
                        member_id: UserId::new(),
                        lines: vec![OrderLine {
                            book_id: BookId::new(),
                            quantity: 2,
                            unit_price_cents: 2499,
                        }],
                        discounts: vec![],
                        claim_code: code.clone(),
                        occurred_at: Utc::now(),
                    }),
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
                        staff_id: UserId::new(),
                        occurred_at: Utc::now(),
                    }),
                    |id| Order::empty(id.into()),
                )
                .unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_token_validation,
    bench_gate_decision,
    bench_place_and_redeem
);
criterion_main!(benches);
