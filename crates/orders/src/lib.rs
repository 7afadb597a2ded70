//! `bookforge-orders` — the order fulfillment workflow.
//!
//! Orders move `Pending → Confirmed → Completed` (with `Cancelled` reachable
//! from either non-terminal state), gated by a claim code that staff redeem
//! to release physical inventory.

pub mod claim;
pub mod discount;
pub mod order;

pub use claim::{ClaimCode, DEFAULT_CLAIM_CODE_LEN};
pub use discount::{Discount, discount_amount_cents, effective_rate_bps};
pub use order::{
    AdvanceStatus, CancelOrder, ConfirmOrder, Order, OrderCommand, OrderEvent, OrderLine,
    OrderStatus, PlaceOrder, RedeemOrder,
};
