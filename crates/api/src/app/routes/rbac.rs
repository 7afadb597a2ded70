//! RBAC audit endpoints: "why was this request denied?"

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use bookforge_auth::{
    ClaimSet, Permission, Role, catalog, catalog::operations, explain, permissions_for_role,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/permissions", get(list_permissions))
        .route("/explain", get(explain_decision))
}

/// GET /rbac/roles - every role and its permission bundle.
pub async fn list_roles(
    Extension(_services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::RBAC_VIEW) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let roles: Vec<_> = Role::ALL
        .iter()
        .map(|role| {
            serde_json::json!({
                "name": role.to_string(),
                "permissions": permissions_for_role(*role),
            })
        })
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response()
}

/// GET /rbac/permissions - the full catalog.
pub async fn list_permissions(
    Extension(_services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::RBAC_VIEW) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let permissions: Vec<&str> = catalog::all_permissions().into_iter().collect();
    (
        StatusCode::OK,
        Json(serde_json::json!({ "permissions": permissions })),
    )
        .into_response()
}

/// GET /rbac/explain?permission=X - explain the caller's own access.
pub async fn explain_decision(
    Extension(_services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Query(query): Query<dto::ExplainQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::RBAC_VIEW) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let decision = explain(&claims, &Permission::new(query.permission));
    (
        StatusCode::OK,
        Json(serde_json::json!({ "explanation": decision })),
    )
        .into_response()
}
