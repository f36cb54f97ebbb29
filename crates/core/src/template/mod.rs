//! Template configuration (singleton, read-mostly)

mod model;
mod store;

pub use model::TemplateConfig;
pub use store::{TemplateDefaults, TemplateStore, TEMPLATE_CACHE_TTL};
