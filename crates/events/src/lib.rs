//! `bookforge-events` — domain event abstractions.
//!
//! The event trait, the stream envelope, and the pub/sub bus used to feed
//! read-model projections.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
