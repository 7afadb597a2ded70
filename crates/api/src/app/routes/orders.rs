//! Order placement, inspection, redemption, and lifecycle routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use bookforge_auth::{ClaimSet, catalog, catalog::operations};
use bookforge_core::{BookId, OrderId};
use bookforge_orders::{Discount, OrderLine, OrderStatus};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/redeem", post(redeem_order))
        .route("/:id/confirm", post(confirm_order))
        .route("/:id/status", post(advance_status))
        .route("/:id/cancel", post(cancel_order))
}

/// POST /orders - member checkout.
pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Json(body): Json<dto::PlaceOrderRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::ORDER_PLACE) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in &body.lines {
        let book_id: BookId = match line.book_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid book id");
            }
        };
        lines.push(OrderLine {
            book_id,
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
        });
    }

    let discounts: Vec<Discount> = body
        .discounts
        .iter()
        .map(|d| Discount {
            percent_bps: d.percent_bps,
            stackable: d.stackable,
        })
        .collect();

    match services.place_order(claims.user_id(), lines, discounts) {
        // The owning member gets the claim code back - it is their receipt.
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(&order, true))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// GET /orders/:id - owner or staff.
pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };

    let Some(order) = services.order_by_id(&order_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found");
    };

    // Staff read any order, without the claim code (codes are presented at
    // the counter, not read back from the API).
    if claims.has_permission(catalog::VIEW_ORDERS) {
        return (StatusCode::OK, Json(dto::order_to_json(&order, false))).into_response();
    }

    // Members read their own orders, claim code included. Anything else is
    // reported as absent rather than forbidden: no existence leak.
    if order.member_id == claims.user_id()
        && authz::require_operation(&claims, operations::ORDER_VIEW_OWN).is_ok()
    {
        return (StatusCode::OK, Json(dto::order_to_json(&order, true))).into_response();
    }

    errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found")
}

/// GET /orders?status= - staff see all, members see their own.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Query(query): Query<dto::OrderListQuery>,
) -> axum::response::Response {
    let status: Option<OrderStatus> = match query.status.as_deref() {
        Some(raw) => match errors::parse_order_status(raw) {
            Ok(s) => Some(s),
            Err(resp) => return resp,
        },
        None => None,
    };

    if claims.has_permission(catalog::VIEW_ORDERS) {
        let items: Vec<_> = services
            .orders_by_status(status)
            .iter()
            .map(|o| dto::order_to_json(o, false))
            .collect();
        return (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response();
    }

    if let Err(e) = authz::require_operation(&claims, operations::ORDER_VIEW_OWN) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items: Vec<_> = services
        .orders_by_member(claims.user_id(), status)
        .iter()
        .map(|o| dto::order_to_json(o, true))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// POST /orders/:id/redeem - staff release inventory against the code.
pub async fn redeem_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
    Json(body): Json<dto::RedeemOrderRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::ORDER_REDEEM) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };

    match services.redeem_order(order_id, &body.claim_code, claims.user_id()) {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order, false))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// POST /orders/:id/confirm - staff staging step.
pub async fn confirm_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::ORDER_CONFIRM) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };

    match services.confirm_order(order_id, claims.user_id()) {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order, false))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// POST /orders/:id/status - forward-only status move.
pub async fn advance_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdvanceStatusRequest>,
) -> axum::response::Response {
    if let Err(e) = authz::require_operation(&claims, operations::ORDER_ADVANCE_STATUS) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };

    let to = match errors::parse_order_status(&body.to) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.advance_order_status(order_id, to, claims.user_id()) {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order, false))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// POST /orders/:id/cancel - member (own, pending) or staff (any
/// non-terminal).
pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };

    let staff_override = claims.has_permission(catalog::UPDATE_ORDER_STATUS);
    let operation = if staff_override {
        operations::ORDER_CANCEL_ANY
    } else {
        operations::ORDER_CANCEL_OWN
    };
    if let Err(e) = authz::require_operation(&claims, operation) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.cancel_order(order_id, claims.user_id(), staff_override) {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order, false))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
