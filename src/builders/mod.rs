//! Builders
//!
//! Fluent builder for Aruba Central configuration.

pub mod config;

pub use config::{central_config, CentralConfigBuilder};
