//! Durable log records with best-effort live fan-out

mod model;
mod publisher;
mod store;

pub use model::{LogLevel, LogRecord};
pub use publisher::{log_topic, LogPublisher};
pub use store::LogStore;
