//! Two-tier key/value storage
//!
//! The durable store is authoritative; the cache is a TTL-bounded
//! accelerator that may be absent or stale but never fatal.

mod cache;
mod file;
mod tiered;

pub use cache::{Cache, MemoryCache};
pub use file::FileStore;
pub use tiered::TieredStore;

pub use tiered::DurableStore;
