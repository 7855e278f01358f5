//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{AudioPreprocessor, SegmentConfig};
use crate::infrastructure::cache::CacheManagerConfig;
use crate::infrastructure::persistence::DiskCacheConfig;
use crate::infrastructure::queue::AudioQueueConfig;

const MIB: u64 = 1024 * 1024;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 队列配置
    #[serde(default)]
    pub queue: QueueConfig,

    /// 两级缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// TTS 引擎配置
    #[serde(default)]
    pub engine: EngineConfig,

    /// 分句配置
    #[serde(default)]
    pub parser: ParserConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 队列配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_lookahead_size")]
    pub lookahead_size: usize,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,

    #[serde(default = "default_synthesis_capacity")]
    pub synthesis_capacity: usize,

    /// 当前片段之前保留音频的片段数
    #[serde(default = "default_retention_period")]
    pub retention_period: usize,

    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,

    #[serde(default = "default_memory_check_interval_ms")]
    pub memory_check_interval_ms: u64,

    #[serde(default = "default_wait_poll_interval_ms")]
    pub wait_poll_interval_ms: u64,

    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// 合成后裁剪首尾静音
    #[serde(default = "default_true")]
    pub trim_silence: bool,

    /// 合成后音量归一化
    #[serde(default = "default_true")]
    pub normalize: bool,
}

fn default_lookahead_size() -> usize {
    3
}

fn default_worker_count() -> usize {
    2
}

fn default_intake_capacity() -> usize {
    100
}

fn default_synthesis_capacity() -> usize {
    50
}

fn default_retention_period() -> usize {
    10
}

fn default_max_memory_bytes() -> u64 {
    100 * MIB
}

fn default_memory_check_interval_ms() -> u64 {
    5000
}

fn default_wait_poll_interval_ms() -> u64 {
    100
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

fn default_pool_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lookahead_size: default_lookahead_size(),
            worker_count: default_worker_count(),
            intake_capacity: default_intake_capacity(),
            synthesis_capacity: default_synthesis_capacity(),
            retention_period: default_retention_period(),
            max_memory_bytes: default_max_memory_bytes(),
            memory_check_interval_ms: default_memory_check_interval_ms(),
            wait_poll_interval_ms: default_wait_poll_interval_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            pool_capacity: default_pool_capacity(),
            trim_silence: true,
            normalize: true,
        }
    }
}

impl QueueConfig {
    /// 转换为 AudioQueue 运行参数
    pub fn to_queue_config(&self) -> AudioQueueConfig {
        AudioQueueConfig {
            lookahead_size: self.lookahead_size,
            worker_count: self.worker_count,
            intake_capacity: self.intake_capacity,
            synthesis_capacity: self.synthesis_capacity,
            retention_period: self.retention_period,
            max_memory_bytes: self.max_memory_bytes,
            memory_check_interval: Duration::from_millis(self.memory_check_interval_ms),
            wait_poll_interval: Duration::from_millis(self.wait_poll_interval_ms),
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
            pool_capacity: self.pool_capacity,
            preprocessor: AudioPreprocessor::new(self.trim_silence, self.normalize),
        }
    }
}

/// 两级缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 是否启用缓存
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// L2 缓存目录
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_l1_size_limit")]
    pub l1_size_limit: u64,

    #[serde(default = "default_l1_ttl_secs")]
    pub l1_ttl_secs: u64,

    #[serde(default = "default_l2_size_limit")]
    pub l2_size_limit: u64,

    #[serde(default = "default_l2_ttl_secs")]
    pub l2_ttl_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_l1_size_limit() -> u64 {
    50 * MIB
}

fn default_l1_ttl_secs() -> u64 {
    3600
}

fn default_l2_size_limit() -> u64 {
    500 * MIB
}

fn default_l2_ttl_secs() -> u64 {
    7 * 24 * 3600
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            l1_size_limit: default_l1_size_limit(),
            l1_ttl_secs: default_l1_ttl_secs(),
            l2_size_limit: default_l2_size_limit(),
            l2_ttl_secs: default_l2_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// 转换为 CacheManager 配置
    pub fn to_manager_config(&self) -> CacheManagerConfig {
        CacheManagerConfig {
            l1_size_limit: self.l1_size_limit,
            l1_ttl: Duration::from_secs(self.l1_ttl_secs),
            disk: DiskCacheConfig {
                dir: self.dir.clone(),
                size_limit: self.l2_size_limit,
                ttl: Duration::from_secs(self.l2_ttl_secs),
            },
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
        }
    }
}

/// TTS 引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// 本地正弦音生成器
    Fake,
    /// 外部 HTTP TTS 服务
    Http,
}

/// TTS 引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_kind")]
    pub kind: EngineKind,

    /// 引擎名称（缓存指纹中的 voice），未设置时使用引擎默认名
    #[serde(default)]
    pub name: Option<String>,

    /// HTTP TTS 服务地址
    #[serde(default = "default_engine_url")]
    pub url: String,

    #[serde(default = "default_engine_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// fake 引擎的模拟延迟
    #[serde(default = "default_fake_latency_ms")]
    pub fake_latency_ms: u64,
}

fn default_engine_kind() -> EngineKind {
    EngineKind::Fake
}

fn default_engine_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_engine_timeout_secs() -> u64 {
    120
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_fake_latency_ms() -> u64 {
    200
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
            name: None,
            url: default_engine_url(),
            timeout_secs: default_engine_timeout_secs(),
            sample_rate: default_sample_rate(),
            fake_latency_ms: default_fake_latency_ms(),
        }
    }
}

/// 分句配置
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// 短句合并阈值（0 表示不合并）
    #[serde(default)]
    pub min_chars: usize,

    /// 超过该长度的句子在逗号等处再切分
    #[serde(default = "default_weak_split_chars")]
    pub weak_split_chars: usize,
}

fn default_weak_split_chars() -> usize {
    200
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_chars: 0,
            weak_split_chars: default_weak_split_chars(),
        }
    }
}

impl ParserConfig {
    pub fn to_segment_config(&self) -> SegmentConfig {
        SegmentConfig {
            min_chars: self.min_chars,
            weak_split_chars: self.weak_split_chars,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.queue.lookahead_size, 3);
        assert_eq!(config.queue.max_memory_bytes, 100 * MIB);
        assert_eq!(config.cache.l2_ttl_secs, 604800);
        assert_eq!(config.engine.kind, EngineKind::Fake);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let json = r#"{"queue": {"worker_count": 4}, "engine": {"kind": "http"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.queue.worker_count, 4);
        assert_eq!(config.queue.lookahead_size, 3);
        assert!(config.queue.trim_silence);
        assert_eq!(config.engine.kind, EngineKind::Http);
        assert_eq!(config.engine.url, "http://localhost:8000");
    }

    #[test]
    fn test_conversions() {
        let config = AppConfig::default();

        let queue = config.queue.to_queue_config();
        assert_eq!(queue.memory_check_interval, Duration::from_secs(5));
        assert!(queue.preprocessor.normalize);

        let cache = config.cache.to_manager_config();
        assert_eq!(cache.disk.dir, PathBuf::from("data/cache"));
        assert_eq!(cache.l1_ttl, Duration::from_secs(3600));

        assert_eq!(config.parser.to_segment_config().weak_split_chars, 200);
    }
}
