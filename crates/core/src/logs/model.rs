//! Log record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One audit/log line produced while processing an event or task
///
/// Serialized camelCase because records go to Socket.IO subscribers
/// as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: Uuid,
    pub agent_id: String,
    pub session_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(agent_id: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            session_id: None,
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
