//! Lifecycle events: the facts an invoice's state is built from.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
