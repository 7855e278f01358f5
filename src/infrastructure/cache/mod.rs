//! Two-Level Audio Cache
//!
//! L1 内存 LRU（infrastructure/memory）+ L2 磁盘缓存（infrastructure/persistence）

mod manager;
mod metrics;

pub use manager::{CacheManager, CacheManagerConfig};
pub use metrics::CacheMetrics;
