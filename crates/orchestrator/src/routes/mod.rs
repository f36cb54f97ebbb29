//! HTTP routes

pub mod agents;
pub mod config;
pub mod events;
pub mod health;
