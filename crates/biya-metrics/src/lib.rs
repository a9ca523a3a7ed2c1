pub mod catalog;
pub mod exporter;
pub mod registry;
pub mod types;

pub use exporter::{BuildInfo, ExporterMetrics};
pub use registry::MetricsRegistry;
pub use types::{MetricDescriptor, MetricType, MetricValue};
