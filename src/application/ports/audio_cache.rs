//! Audio Cache Port - 音频缓存管理
//!
//! 定义合成音频缓存的抽象接口，具体实现为内存 L1 + 磁盘 L2 的两级缓存

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Audio Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("Entry too large: {size} bytes exceeds limit {limit}")]
    EntryTooLarge { size: u64, limit: u64 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Cache closed")]
    Closed,

    #[error("Multiple cache errors: {}", .0.join("; "))]
    Aggregate(Vec<String>),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// 缓存条目
///
/// `get` 返回独立的副本，调用方无法修改缓存内部的字节。
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub audio: Vec<u8>,
    pub text: String,
    pub voice: String,
    pub speed: f32,
    pub cache_key: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    pub hits: u64,
}

impl AudioData {
    pub fn new(
        cache_key: impl Into<String>,
        audio: Vec<u8>,
        text: impl Into<String>,
        voice: impl Into<String>,
        speed: f32,
    ) -> Self {
        let size = audio.len() as u64;
        Self {
            audio,
            text: text.into(),
            voice: voice.into(),
            speed,
            cache_key: cache_key.into(),
            timestamp: Utc::now(),
            size,
            hits: 0,
        }
    }
}

/// 可单独重置的指标计数器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricCounter {
    TotalAccesses,
    L1Hits,
    L2Hits,
    Misses,
    Writes,
    Promotions,
    Cleanups,
}

/// 缓存指标快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub total_accesses: u64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub promotions: u64,
    pub cleanups: u64,
    pub hit_rate: f64,
}

/// Audio Cache Port
///
/// 基于内容指纹的两级缓存：
/// - get: 先查 L1，未命中再查 L2，L2 命中时提升到 L1
/// - put: 写穿两级，L1 失败只记录日志，L2 必须成功
#[async_trait]
pub trait AudioCachePort: Send + Sync {
    /// 读取缓存，未命中返回 `CacheError::Miss`
    async fn get(&self, cache_key: &str) -> Result<AudioData, CacheError>;

    /// 写入缓存
    async fn put(&self, cache_key: &str, data: AudioData) -> Result<(), CacheError>;

    /// 删除条目
    async fn delete(&self, cache_key: &str) -> Result<(), CacheError>;

    /// 清空缓存
    async fn clear(&self) -> Result<(), CacheError>;

    /// 两级缓存占用的总字节数
    fn size(&self) -> u64;

    /// 指标快照
    fn metrics(&self) -> CacheMetricsSnapshot;

    /// 停止后台清理并持久化
    async fn close(&self) -> Result<(), CacheError>;
}
