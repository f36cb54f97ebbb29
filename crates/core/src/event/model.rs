//! Event model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Kind of external trigger that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Email,
    Sms,
    Webhook,
    Scheduled,
}

impl EventType {
    /// Parse an event type from its wire representation
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "webhook" => Ok(Self::Webhook),
            "scheduled" => Ok(Self::Scheduled),
            _ => Err(Error::InvalidInput(format!("Unknown event type: {}", s))),
        }
    }

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Webhook => "webhook",
            Self::Scheduled => "scheduled",
        }
    }
}

/// An inbound event recorded before any processing happens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub agent_id: String,
    pub event_type: EventType,
    /// Opaque key/value payload supplied by the trigger
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, after successful processing
    pub processed_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Create a new unprocessed event
    pub fn new(
        agent_id: impl Into<String>,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            event_type,
            payload,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Whether this event has already been consumed
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parse() {
        assert_eq!(EventType::parse("webhook").unwrap(), EventType::Webhook);
        assert_eq!(EventType::parse("EMAIL").unwrap(), EventType::Email);
        assert_eq!(EventType::parse("sms").unwrap(), EventType::Sms);
        assert_eq!(EventType::parse("scheduled").unwrap(), EventType::Scheduled);
        assert!(EventType::parse("carrier-pigeon").is_err());
    }

    #[test]
    fn test_new_event_is_unprocessed() {
        let event = Event::new("a1", EventType::Webhook, serde_json::json!({}));
        assert!(!event.is_processed());
        assert_eq!(event.agent_id, "a1");
    }
}
