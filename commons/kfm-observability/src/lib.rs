pub mod metrics;
pub mod otel_exporter;
pub mod tracing;

pub use metrics::*;
pub use otel_exporter::*;
pub use tracing::*;
