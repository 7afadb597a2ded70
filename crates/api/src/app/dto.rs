//! Request/response DTOs and JSON mapping helpers.

use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use bookforge_infra::projections::{OrderReadModel, UserReadModel};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub book_id: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct DiscountRequest {
    pub percent_bps: u32,
    #[serde(default)]
    pub stackable: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub lines: Vec<OrderLineRequest>,
    #[serde(default)]
    pub discounts: Vec<DiscountRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemOrderRequest {
    pub claim_code: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    /// Target status ("confirmed" or "completed").
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionUserRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// "admin", "staff", or "member".
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateUserRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    /// Optional status filter ("pending", "confirmed", "completed",
    /// "cancelled").
    pub status: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Order JSON. The claim code is included only for the owning member: staff
/// verify codes presented at the counter, they don't read them back.
pub fn order_to_json(order: &OrderReadModel, include_claim_code: bool) -> JsonValue {
    let mut value = json!({
        "id": order.order_id.to_string(),
        "member_id": order.member_id.to_string(),
        "status": order.status.to_string(),
        "lines": order
            .lines
            .iter()
            .map(|line| {
                json!({
                    "book_id": line.book_id.to_string(),
                    "quantity": line.quantity,
                    "unit_price_cents": line.unit_price_cents,
                })
            })
            .collect::<Vec<_>>(),
        "total_cents": order.total_cents,
        "discount_cents": order.discount_cents,
        "placed_at": order.placed_at.to_rfc3339(),
        "updated_at": order.updated_at.to_rfc3339(),
        "processed_by": order.processed_by.map(|id| id.to_string()),
    });

    if include_claim_code {
        value["claim_code"] = json!(order.claim_code.as_str());
    }

    value
}

/// User JSON. The password hash never leaves the process.
pub fn user_to_json(user: &UserReadModel) -> JsonValue {
    json!({
        "id": user.user_id.to_string(),
        "email": user.email,
        "display_name": user.display_name,
        "role": user.role.to_string(),
        "active": user.active,
        "orders_placed": user.orders_placed,
    })
}
