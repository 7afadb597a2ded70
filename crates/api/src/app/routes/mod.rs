use axum::{
    Router,
    routing::{get, patch, post},
};

pub mod admin;
pub mod auth;
pub mod orders;
pub mod rbac;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/me", patch(system::update_me))
        .route("/auth/logout", post(auth::logout))
        .nest("/orders", orders::router())
        .nest("/rbac", rbac::router())
        .nest("/admin", admin::router())
}

/// Router for unauthenticated endpoints (never enter the auth gate).
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}
