//! Tracing setup and Prometheus metrics registries shared by every binary
//! in the workspace.

pub mod metrics;
pub mod tracing_init;

pub use metrics::CoreMetrics;
pub use tracing_init::init_tracing;
