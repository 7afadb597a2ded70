//! Read-model projections fed from the event bus.
//!
//! Projections are idempotent: each tracks a per-aggregate cursor and skips
//! anything at or below it, so at-least-once delivery (and the synchronous
//! re-apply in the service layer) is safe.

pub mod orders;
pub mod users;

pub use orders::{OrderReadModel, OrdersProjection};
pub use users::{UserReadModel, UsersProjection};
