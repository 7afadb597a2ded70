//! Health, identity echo, and self-service profile routes.

use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use bookforge_auth::ClaimSet;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// GET /health - public liveness probe.
pub async fn health() -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

/// GET /whoami - echo the validated claim set (identity, role, permissions).
pub async fn whoami(Extension(claims): Extension<ClaimSet>) -> axum::response::Response {
    let permissions: Vec<&str> = claims.permissions().iter().map(|p| p.as_str()).collect();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": claims.user_id().to_string(),
            "email": claims.email(),
            "display_name": claims.display_name(),
            "role": claims.role().to_string(),
            "permissions": permissions,
            "session_id": claims.session_id().to_string(),
            "expires_at": claims.expires_at().to_rfc3339(),
        })),
    )
        .into_response()
}

/// PATCH /me - update the caller's own profile. Authenticated, but not
/// permission-gated: everyone owns their display name.
pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Json(body): Json<dto::UpdateProfileRequest>,
) -> axum::response::Response {
    match services.update_display_name(claims.user_id(), &body.display_name) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
