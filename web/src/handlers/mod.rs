//! HTTP request handlers.

pub mod exec;
pub mod health;
pub mod metrics;
