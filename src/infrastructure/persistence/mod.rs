//! Persistence Layer - 数据持久化
//!
//! 磁盘音频缓存（索引文件 + 每个 key 一个音频文件）

mod disk_cache;

pub use disk_cache::{CacheMetadata, CleanupResult, DiskCache, DiskCacheConfig, INDEX_FILE};
