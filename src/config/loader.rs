//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（narrator.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, EngineKind};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["narrator", "narrator.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `NARRATOR_`，层级分隔符 `__`）
/// 2. 配置文件（narrator.toml 或 narrator.local.toml）
/// 3. 默认值（见 types.rs 中的 serde default）
///
/// # 环境变量示例
/// - `NARRATOR_QUEUE__LOOKAHEAD_SIZE=5`
/// - `NARRATOR_ENGINE__KIND=http`
/// - `NARRATOR_ENGINE__URL=http://tts-server:8000`
/// - `NARRATOR_CACHE__DIR=/var/cache/narrator`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 2. 添加环境变量（最高优先级）
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix("NARRATOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    // 3. 反序列化，缺失字段使用默认值
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let queue = &config.queue;
    if queue.worker_count == 0 {
        return Err(invalid("queue.worker_count cannot be 0"));
    }
    if queue.intake_capacity == 0 || queue.synthesis_capacity == 0 {
        return Err(invalid("queue capacities cannot be 0"));
    }
    if queue.max_memory_bytes == 0 {
        return Err(invalid("queue.max_memory_bytes cannot be 0"));
    }
    if queue.memory_check_interval_ms == 0 || queue.wait_poll_interval_ms == 0 {
        return Err(invalid("queue intervals cannot be 0"));
    }

    let cache = &config.cache;
    if cache.enabled {
        if cache.l1_size_limit == 0 || cache.l2_size_limit == 0 {
            return Err(invalid("cache size limits cannot be 0"));
        }
        if cache.cleanup_interval_secs == 0 {
            return Err(invalid("cache.cleanup_interval_secs cannot be 0"));
        }
        if cache.dir.as_os_str().is_empty() {
            return Err(invalid("cache.dir cannot be empty"));
        }
    }

    if config.engine.kind == EngineKind::Http && config.engine.url.is_empty() {
        return Err(invalid("engine.url cannot be empty for the http engine"));
    }
    if config.engine.sample_rate == 0 {
        return Err(invalid("engine.sample_rate cannot be 0"));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Narrator Configuration ===");
    tracing::info!(
        "Queue: lookahead={}, workers={}, intake={}, synthesis={}",
        config.queue.lookahead_size,
        config.queue.worker_count,
        config.queue.intake_capacity,
        config.queue.synthesis_capacity
    );
    tracing::info!(
        "Memory: max={} bytes, retention={}, check every {}ms",
        config.queue.max_memory_bytes,
        config.queue.retention_period,
        config.queue.memory_check_interval_ms
    );
    tracing::info!("Cache Enabled: {}", config.cache.enabled);
    if config.cache.enabled {
        tracing::info!("Cache Directory: {:?}", config.cache.dir);
        tracing::info!(
            "Cache Limits: L1={} bytes ({}s), L2={} bytes ({}s)",
            config.cache.l1_size_limit,
            config.cache.l1_ttl_secs,
            config.cache.l2_size_limit,
            config.cache.l2_ttl_secs
        );
    }
    tracing::info!("Engine: {:?}", config.engine.kind);
    if config.engine.kind == EngineKind::Http {
        tracing::info!("Engine URL: {}", config.engine.url);
        tracing::info!("Engine Timeout: {}s", config.engine.timeout_secs);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("==============================");
}
