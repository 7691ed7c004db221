//! Telemetry
//!
//! Metric hooks for the resilient client. Structured logging goes through
//! the `tracing` crate directly.

pub mod metrics;

pub use metrics::{
    CentralMetrics, InMemoryMetrics, MetricEntry, MetricLabels, MetricNames, NoOpMetrics,
};
