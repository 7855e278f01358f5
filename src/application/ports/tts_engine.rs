//! TTS Engine Port - TTS 合成引擎抽象
//!
//! 定义语音合成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

/// 默认采样率
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid speed: {0}")]
    InvalidSpeed(f32),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// TTS Engine Port
///
/// 每次调用返回一段完整的 16-bit signed little-endian mono PCM，采样率由 `sample_rate` 给出。
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 合成文本
    async fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, TtsError>;

    /// 设置默认语速
    fn set_speed(&self, speed: f32) -> Result<(), TtsError>;

    /// 校验引擎配置
    async fn validate(&self) -> Result<(), TtsError>;

    /// 引擎名称，同时作为缓存指纹中的 voice
    fn name(&self) -> &str;

    /// 检查引擎是否可用
    async fn is_available(&self) -> bool {
        true
    }

    /// 输出 PCM 的采样率
    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }
}

/// 校验语速范围
pub fn validate_speed(speed: f32) -> Result<(), TtsError> {
    if speed.is_finite() && (0.25..=4.0).contains(&speed) {
        Ok(())
    } else {
        Err(TtsError::InvalidSpeed(speed))
    }
}
