//! Administration: user provisioning, role changes, deactivation, and
//! forced session revocation.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use bookforge_auth::{ClaimSet, catalog::operations};
use bookforge_core::UserId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;

pub fn router() -> Router {
    Router::new()
        .route("/users", post(provision_user).get(list_users))
        .route("/users/:id/role", post(change_role))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/reactivate", post(reactivate_user))
        .route("/users/:id/sessions/revoke", post(revoke_sessions))
}

fn parse_user_id(id: &str) -> Result<UserId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
    })
}

/// POST /admin/users - provision an identity with any role.
pub async fn provision_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Json(body): Json<dto::ProvisionUserRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::USERS_MANAGE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let role = match errors::parse_role(&body.role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.register(&body.email, &body.password, &body.display_name, role) {
        Ok(user_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": user_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::registration_error_to_response(e),
    }
}

/// GET /admin/users - directory listing.
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::USERS_MANAGE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items: Vec<_> = services.users_list().iter().map(dto::user_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// POST /admin/users/:id/role - move an identity between roles. Outstanding
/// sessions are revoked; their tokens carry a stale permission bundle.
pub async fn change_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeRoleRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::USERS_MANAGE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let role = match errors::parse_role(&body.role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.change_role(user_id, role, claims.role()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// POST /admin/users/:id/deactivate - soft delete; revokes all sessions.
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
    Json(body): Json<dto::DeactivateUserRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::USERS_MANAGE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.deactivate_user(user_id, &body.reason) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// POST /admin/users/:id/reactivate
pub async fn reactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::USERS_MANAGE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.reactivate_user(user_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// POST /admin/users/:id/sessions/revoke - forced logout everywhere.
pub async fn revoke_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::SESSIONS_REVOKE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let user_id = match parse_user_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let revoked = services.revoke_user_sessions(user_id);
    (
        StatusCode::OK,
        Json(serde_json::json!({ "revoked": revoked })),
    )
        .into_response()
}
