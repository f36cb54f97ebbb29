//! Template configuration store
//!
//! Two-tier with a 24-hour cache TTL. A double miss falls back to
//! environment-seeded defaults, which are then persisted so future
//! reads hit the durable tier.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::model::TemplateConfig;
use crate::store::{Cache, DurableStore, TieredStore};
use crate::Result;

/// Cache TTL for template configuration
pub const TEMPLATE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const TEMPLATE_KEY: &str = "config:templates";

/// Fallback template IDs, typically seeded from the process environment
#[derive(Debug, Clone)]
pub struct TemplateDefaults {
    pub conductor_template: String,
    pub worker_template: String,
    pub infrastructure_template: String,
}

impl TemplateDefaults {
    /// Read defaults from the environment, with built-in fallbacks
    pub fn from_env() -> Self {
        Self {
            conductor_template: std::env::var("CONDUCTOR_TEMPLATE")
                .unwrap_or_else(|_| "conductor_default".to_string()),
            worker_template: std::env::var("WORKER_TEMPLATE")
                .unwrap_or_else(|_| "worker_default".to_string()),
            infrastructure_template: std::env::var("INFRA_TEMPLATE")
                .unwrap_or_else(|_| "infra_default".to_string()),
        }
    }
}

/// Store for the singleton template configuration
pub struct TemplateStore {
    tiered: TieredStore,
    defaults: TemplateDefaults,
}

impl TemplateStore {
    pub fn new(
        cache: Arc<dyn Cache>,
        durable: Arc<dyn DurableStore>,
        defaults: TemplateDefaults,
    ) -> Self {
        Self {
            tiered: TieredStore::new(cache, durable, TEMPLATE_CACHE_TTL),
            defaults,
        }
    }

    /// Read the configuration, seeding defaults on a double miss
    ///
    /// The seeded default is persisted best-effort; a seed-persist
    /// failure still returns the default to the caller.
    pub async fn get(&self) -> Result<TemplateConfig> {
        if let Some(value) = self.tiered.get(TEMPLATE_KEY).await? {
            return Ok(serde_json::from_value(value)?);
        }

        let config = TemplateConfig::new(
            self.defaults.conductor_template.clone(),
            self.defaults.worker_template.clone(),
            self.defaults.infrastructure_template.clone(),
            "system",
        );

        if let Err(err) = self
            .tiered
            .save(TEMPLATE_KEY, serde_json::to_value(&config)?)
            .await
        {
            warn!("Failed to persist seeded template config: {}", err);
        }

        Ok(config)
    }

    /// Replace the configuration
    ///
    /// Validation runs before either tier is touched; a single invalid
    /// field rejects the entire update with no partial write.
    pub async fn update(&self, config: TemplateConfig) -> Result<TemplateConfig> {
        config.validate()?;
        self.tiered
            .save(TEMPLATE_KEY, serde_json::to_value(&config)?)
            .await?;
        Ok(config)
    }
}
