//! HTTP API application wiring (Axum router + service wiring).
//!
//! Folder map:
//! - `services.rs`: infrastructure wiring (event store/bus, projections,
//!   sessions, dispatcher) and application services
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use axum::{Extension, Router};
use tower::ServiceBuilder;

use bookforge_auth::TokenConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: TokenConfig, enforce_sessions: bool) -> Router {
    let (app_services, validator) = services::build_services(config);

    let auth_state = middleware::AuthState {
        validator,
        sessions: app_services.sessions.clone(),
        enforce_sessions,
    };

    // Guarded routes: bearer token, session liveness, claim set in
    // extensions. The gate is opt-in per route - public routes never see it.
    let protected = routes::router()
        .layer(Extension(app_services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    routes::public_router()
        .layer(Extension(app_services))
        .merge(protected)
        .layer(ServiceBuilder::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use bookforge_auth::{Role, TokenValidator, catalog};
    use bookforge_infra::command_dispatcher::DispatchError;
    use bookforge_infra::session_store::token_fingerprint;
    use bookforge_orders::{OrderLine, OrderStatus};

    use crate::app::services::{AppServices, LoginError, build_services};
    use std::sync::Arc;

    fn test_config() -> TokenConfig {
        TokenConfig::new(
            "0123456789abcdef0123456789abcdef",
            "bookforge",
            "bookforge-clients",
            Duration::hours(72),
        )
        .unwrap()
    }

    fn setup() -> (Arc<AppServices>, Arc<TokenValidator>) {
        build_services(test_config())
    }

    fn member_with_order_lines() -> Vec<OrderLine> {
        vec![
            OrderLine {
                book_id: bookforge_core::BookId::new(),
                quantity: 1,
                unit_price_cents: 1999,
            },
            OrderLine {
                book_id: bookforge_core::BookId::new(),
                quantity: 1,
                unit_price_cents: 2999,
            },
        ]
    }

    #[tokio::test]
    async fn register_login_place_redeem_full_flow() {
        let (services, validator) = setup();

        services
            .register_member("reader@example.com", "correct horse", "Avid Reader")
            .unwrap();
        let staff_id = services
            .register("staff@example.com", "staff pass", "Counter Staff", Role::Staff)
            .unwrap();

        // Login issues a token that validates and carries the member bundle.
        let login = services.login("reader@example.com", "correct horse").unwrap();
        let claims = validator.validate(&login.token).unwrap();
        assert_eq!(claims.role(), Role::Member);
        assert!(claims.has_permission(catalog::PLACE_ORDERS));
        assert!(!claims.has_permission(catalog::PROCESS_ORDERS));
        assert!(login.permissions.contains(&catalog::PLACE_ORDERS.to_string()));

        // Place: $49.98 with a 10% discount → 500 cents frozen.
        let order = services
            .place_order(
                login.user_id,
                member_with_order_lines(),
                vec![bookforge_orders::Discount::single(1000)],
            )
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_cents, 4998);
        assert_eq!(order.discount_cents, 500);
        assert_eq!(order.claim_code.as_str().len(), 8);

        // The member counter advanced.
        assert_eq!(
            services.user_by_id(&login.user_id).unwrap().orders_placed,
            1
        );

        // Staff redeems with the correct code.
        let redeemed = services
            .redeem_order(order.order_id, order.claim_code.as_str(), staff_id)
            .unwrap();
        assert_eq!(redeemed.status, OrderStatus::Completed);
        assert_eq!(redeemed.processed_by, Some(staff_id));

        // Exactly once: the replay is a transition error.
        let err = services
            .redeem_order(order.order_id, order.claim_code.as_str(), staff_id)
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn wrong_claim_code_is_rejected_without_state_change() {
        let (services, _) = setup();
        let member = services
            .register_member("m@example.com", "pw pw pw pw", "M")
            .unwrap();
        let staff = services
            .register("s@example.com", "pw pw pw pw", "S", Role::Staff)
            .unwrap();

        let order = services
            .place_order(member, member_with_order_lines(), vec![])
            .unwrap();

        for _ in 0..3 {
            let err = services
                .redeem_order(order.order_id, "ffffffff", staff)
                .unwrap_err();
            assert!(matches!(err, DispatchError::ClaimCodeMismatch));
        }

        assert_eq!(
            services.order_by_id(&order.order_id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (services, _) = setup();
        services
            .register_member("known@example.com", "right password", "K")
            .unwrap();

        let unknown = services.login("unknown@example.com", "x").unwrap_err();
        let wrong_pw = services.login("known@example.com", "wrong").unwrap_err();
        assert!(matches!(unknown, LoginError::InvalidCredentials));
        assert!(matches!(wrong_pw, LoginError::InvalidCredentials));

        // Deactivated accounts answer the same way.
        let user = services.users.find_by_email("known@example.com").unwrap();
        services.deactivate_user(user.user_id, "closure").unwrap();
        let inactive = services.login("known@example.com", "right password").unwrap_err();
        assert!(matches!(inactive, LoginError::InvalidCredentials));
    }

    #[tokio::test]
    async fn revoked_session_defeats_a_valid_token() {
        let (services, validator) = setup();
        services
            .register_member("reader@example.com", "correct horse", "R")
            .unwrap();
        let login = services.login("reader@example.com", "correct horse").unwrap();

        // Cryptographic validity is intact...
        let claims = validator.validate(&login.token).unwrap();
        assert!(services.sessions.is_active(claims.session_id(), Utc::now()));

        // ...but the session check now fails, which is what the middleware
        // enforces for every guarded request.
        services.logout(claims.session_id());
        assert!(validator.validate(&login.token).is_ok());
        assert!(!services.sessions.is_active(claims.session_id(), Utc::now()));
    }

    #[tokio::test]
    async fn session_fingerprint_binds_session_to_its_token() {
        let (services, validator) = setup();
        services
            .register_member("reader@example.com", "correct horse", "R")
            .unwrap();

        let first = services.login("reader@example.com", "correct horse").unwrap();
        let second = services.login("reader@example.com", "correct horse").unwrap();

        // Two concurrent sessions, independently revocable.
        let first_claims = validator.validate(&first.token).unwrap();
        let second_claims = validator.validate(&second.token).unwrap();
        assert_ne!(first_claims.session_id(), second_claims.session_id());

        // Each session only matches its own token's fingerprint.
        assert!(services.sessions.fingerprint_matches(
            first_claims.session_id(),
            &token_fingerprint(&first.token)
        ));
        assert!(!services.sessions.fingerprint_matches(
            first_claims.session_id(),
            &token_fingerprint(&second.token)
        ));

        services.logout(first_claims.session_id());
        assert!(!services.sessions.is_active(first_claims.session_id(), Utc::now()));
        assert!(services.sessions.is_active(second_claims.session_id(), Utc::now()));
    }

    #[tokio::test]
    async fn duplicate_email_registration_conflicts() {
        let (services, _) = setup();
        services
            .register_member("dup@example.com", "pw pw pw pw", "One")
            .unwrap();
        let err = services
            .register_member("Dup@Example.com", "pw pw pw pw", "Two")
            .unwrap_err();
        assert!(matches!(
            err,
            crate::app::services::RegistrationError::EmailTaken
        ));
    }

    #[tokio::test]
    async fn role_change_revokes_outstanding_sessions() {
        let (services, validator) = setup();
        let user_id = services
            .register_member("promote@example.com", "pw pw pw pw", "P")
            .unwrap();
        let login = services.login("promote@example.com", "pw pw pw pw").unwrap();
        let claims = validator.validate(&login.token).unwrap();

        services.change_role(user_id, Role::Staff, Role::Admin).unwrap();

        // The old token's embedded member bundle is now stale; its session
        // is gone, so the middleware will refuse it.
        assert!(!services.sessions.is_active(claims.session_id(), Utc::now()));
        assert_eq!(services.user_by_id(&user_id).unwrap().role, Role::Staff);
    }

    #[tokio::test]
    async fn member_cancel_and_staff_cancel_paths() {
        let (services, _) = setup();
        let member = services
            .register_member("m@example.com", "pw pw pw pw", "M")
            .unwrap();
        let staff = services
            .register("s@example.com", "pw pw pw pw", "S", Role::Staff)
            .unwrap();

        // Member cancels own pending order.
        let order = services
            .place_order(member, member_with_order_lines(), vec![])
            .unwrap();
        let cancelled = services.cancel_order(order.order_id, member, false).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // Double cancel is a visible error.
        let err = services.cancel_order(order.order_id, member, false).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition(_)));

        // Staff cancels a confirmed order the member no longer can.
        let order = services
            .place_order(member, member_with_order_lines(), vec![])
            .unwrap();
        services.confirm_order(order.order_id, staff).unwrap();
        let err = services.cancel_order(order.order_id, member, false).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition(_)));
        let cancelled = services.cancel_order(order.order_id, staff, true).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn order_listings_filter_by_status_and_member() {
        let (services, _) = setup();
        let alice = services
            .register_member("a@example.com", "pw pw pw pw", "A")
            .unwrap();
        let bob = services
            .register_member("b@example.com", "pw pw pw pw", "B")
            .unwrap();
        let staff = services
            .register("s@example.com", "pw pw pw pw", "S", Role::Staff)
            .unwrap();

        let a1 = services
            .place_order(alice, member_with_order_lines(), vec![])
            .unwrap();
        services
            .place_order(bob, member_with_order_lines(), vec![])
            .unwrap();
        services
            .redeem_order(a1.order_id, a1.claim_code.as_str(), staff)
            .unwrap();

        assert_eq!(services.orders_by_status(None).len(), 2);
        assert_eq!(
            services.orders_by_status(Some(OrderStatus::Completed)).len(),
            1
        );
        assert_eq!(services.orders_by_member(alice, None).len(), 1);
        assert_eq!(
            services
                .orders_by_member(alice, Some(OrderStatus::Pending))
                .len(),
            0
        );
    }

    #[tokio::test]
    async fn build_app_wires_public_and_protected_routers() {
        // Smoke check: the router is constructible with session enforcement
        // on; handler behavior is covered by the service tests above.
        let _app = build_app(test_config(), true).await;
    }
}
