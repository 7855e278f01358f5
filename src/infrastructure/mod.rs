//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现，以及朗读队列本身

pub mod adapters;
pub mod cache;
pub mod events;
pub mod memory;
pub mod persistence;
pub mod queue;
pub mod worker;

pub use cache::{CacheManager, CacheManagerConfig};
pub use events::{EventPublisher, QueueCallbacks, QueueEvent};
pub use queue::{AudioQueue, AudioQueueConfig, QueueDepth, QueueMetrics};
