//! Template configuration model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sandbox template identifiers used when deploying agent runtimes
///
/// A singleton record, read far more often than written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub conductor_template: String,
    pub worker_template: String,
    pub infrastructure_template: String,
    pub last_updated: DateTime<Utc>,
    pub updated_by: String,
}

impl TemplateConfig {
    pub fn new(
        conductor_template: impl Into<String>,
        worker_template: impl Into<String>,
        infrastructure_template: impl Into<String>,
        updated_by: impl Into<String>,
    ) -> Self {
        Self {
            conductor_template: conductor_template.into(),
            worker_template: worker_template.into(),
            infrastructure_template: infrastructure_template.into(),
            last_updated: Utc::now(),
            updated_by: updated_by.into(),
        }
    }

    /// Validate every template identifier
    ///
    /// Identifiers are restricted to letters, digits, and underscore.
    /// One invalid field rejects the whole record.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("conductorTemplate", &self.conductor_template),
            ("workerTemplate", &self.worker_template),
            ("infrastructureTemplate", &self.infrastructure_template),
        ] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(Error::InvalidInput(format!(
                    "Invalid template ID for {}: {:?}",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_template_ids() {
        let config = TemplateConfig::new("conductor_v2", "worker_1", "infra", "system");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_template_id_rejected() {
        let config = TemplateConfig::new("conductor!", "worker_1", "infra", "system");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_template_id_rejected() {
        let config = TemplateConfig::new("", "worker_1", "infra", "system");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hyphen_rejected() {
        let config = TemplateConfig::new("conductor", "worker-1", "infra", "system");
        assert!(config.validate().is_err());
    }
}
