//! Audio Queue
//!
//! 片段队列、预读调度、导航和内存管理。合成由 infrastructure/worker 完成。

mod audio_queue;
mod config;
mod inner;
mod state;

pub use audio_queue::{AudioQueue, QueueDepth, QueueMetrics};
pub use config::AudioQueueConfig;
pub use inner::ReclaimReport;
pub(crate) use inner::QueueInner;
