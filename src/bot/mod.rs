pub mod orchestrator;
pub mod metrics;

pub use orchestrator::{ScanPipeline, ScanRequest, StopHandle};
pub use metrics::{ScanMetrics, StoreMetrics};
