//! Domain events and their stream envelopes.
//!
//! Catalog aggregates emit events; the authority records them wrapped in an
//! [`EventEnvelope`] so a product's history can be replayed or shown.

pub mod envelope;
pub mod event;

pub use envelope::{EventEnvelope, StreamRef};
pub use event::Event;
