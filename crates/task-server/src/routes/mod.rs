//! HTTP routes

pub mod execute;
pub mod health;
