//! Host resource sampling, threshold alerts and error pattern tracking.

pub mod errors;
pub mod metrics;
#[allow(clippy::module_inception)]
pub mod monitor;
pub mod performance;
pub mod probe;
pub mod types;

pub use errors::ErrorTracker;
pub use metrics::MetricsCollector;
pub use monitor::SystemMonitor;
pub use performance::PerformanceMonitor;
pub use probe::{SysinfoProbe, SystemProbe};
pub use types::{AlertLevel, ErrorRecord, MetricPoint, ResourceSample};
