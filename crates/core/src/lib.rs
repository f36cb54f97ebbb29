//! Core library for Agent Relay
//!
//! This crate contains the core business logic, including:
//! - Event model and durable event store
//! - Two-tier (cache + durable) state stores
//! - Session, deployment, and template configuration
//! - Durable log records with live fan-out

pub mod error;
pub mod event;
pub mod logs;
pub mod session;
pub mod store;
pub mod template;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
