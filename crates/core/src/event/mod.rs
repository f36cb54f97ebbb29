//! Inbound event model and durable event store

mod model;
mod store;

pub use model::{Event, EventType};
pub use store::FileEventStore;
