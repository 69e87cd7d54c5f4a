pub mod batch;
pub mod dispatcher;
pub mod metrics;

pub use batch::{Batch, BatchBuffer, FlushTrigger};
pub use dispatcher::FlushDispatcher;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
