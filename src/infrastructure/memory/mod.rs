//! In-Memory Implementations
//!
//! - lru_cache: L1 内存缓存
//! - segment_pool: AudioSegment 对象池

mod lru_cache;
mod segment_pool;

pub use lru_cache::{entry_size, MemoryCache};
pub use segment_pool::SegmentPool;
