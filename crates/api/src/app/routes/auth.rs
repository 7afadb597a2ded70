//! Registration, login, logout.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use bookforge_auth::ClaimSet;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// POST /auth/register - public member self-registration.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    match services.register_member(&body.email, &body.password, &body.display_name) {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": user_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::registration_error_to_response(e),
    }
}

/// POST /auth/login - public; returns the token, session id, expiry, and
/// the resolved permission list.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    match services.login(&body.email, &body.password) {
        Ok(success) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "token": success.token,
                "session_id": success.session_id.to_string(),
                "expires_at": success.expires_at.to_rfc3339(),
                "permissions": success.permissions,
            })),
        )
            .into_response(),
        Err(e) => errors::login_error_to_response(e),
    }
}

/// POST /auth/logout - revokes the presented session.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
) -> axum::response::Response {
    services.logout(claims.session_id());
    StatusCode::NO_CONTENT.into_response()
}
