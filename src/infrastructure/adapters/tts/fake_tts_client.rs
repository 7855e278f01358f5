//! Fake TTS Client - 用于测试和离线运行的 TTS 客户端
//!
//! 不调用任何服务，按文本长度生成一段正弦音，前后带静音

use async_trait::async_trait;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::application::ports::{validate_speed, TtsEnginePort, TtsError, DEFAULT_SAMPLE_RATE};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 引擎名称（同时作为缓存指纹的 voice）
    pub name: String,
    /// 采样率
    pub sample_rate: u32,
    /// 模拟合成延迟
    pub latency: Duration,
    /// 每个字符对应的音频时长（毫秒，1.0 语速）
    pub ms_per_char: u32,
    /// 首尾静音时长（毫秒）
    pub padding_ms: u32,
    /// 正弦音频率
    pub frequency: f32,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            name: "fake".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            latency: Duration::from_millis(200),
            ms_per_char: 60,
            padding_ms: 50,
            frequency: 440.0,
        }
    }
}

/// Fake TTS Client
///
/// 相同的文本和语速总是生成相同的 PCM
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    /// 默认语速（f32 bits）
    speed: AtomicU32,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(
            name = %config.name,
            sample_rate = config.sample_rate,
            latency_ms = config.latency.as_millis() as u64,
            "FakeTtsClient initialized"
        );
        Self {
            config,
            speed: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Relaxed))
    }

    fn samples_for_ms(&self, ms: f32) -> usize {
        (self.config.sample_rate as f32 * ms / 1000.0) as usize
    }

    /// 生成 PCM：静音 + 正弦音 + 静音
    fn render(&self, text: &str, speed: f32) -> Vec<u8> {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
        let tone_ms = chars as f32 * self.config.ms_per_char as f32 / speed;
        let tone_samples = self.samples_for_ms(tone_ms);
        let pad_samples = self.samples_for_ms(self.config.padding_ms as f32);

        let mut pcm = Vec::with_capacity((tone_samples + 2 * pad_samples) * 2);
        pcm.resize(pad_samples * 2, 0);

        let step = 2.0 * PI * self.config.frequency / self.config.sample_rate as f32;
        for i in 0..tone_samples {
            let sample = ((i as f32 * step).sin() * 0.5 * i16::MAX as f32) as i16;
            pcm.extend_from_slice(&sample.to_le_bytes());
        }

        pcm.resize(pcm.len() + pad_samples * 2, 0);
        pcm
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, TtsError> {
        validate_speed(speed)?;

        tracing::debug!(
            text_len = text.len(),
            speed,
            "FakeTtsClient: rendering tone"
        );

        // 模拟合成延迟
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        Ok(self.render(text, speed))
    }

    fn set_speed(&self, speed: f32) -> Result<(), TtsError> {
        validate_speed(speed)?;
        self.speed.store(speed.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    async fn validate(&self) -> Result<(), TtsError> {
        if self.config.sample_rate == 0 {
            return Err(TtsError::Unavailable("sample_rate must be non-zero".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{pcm_duration, trim_silence};

    fn client() -> FakeTtsClient {
        FakeTtsClient::new(FakeTtsClientConfig {
            latency: Duration::ZERO,
            sample_rate: 1000,
            ms_per_char: 10,
            padding_ms: 20,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_deterministic_output() {
        let client = client();
        let a = client.synthesize("Hello.", 1.0).await.unwrap();
        let b = client.synthesize("Hello.", 1.0).await.unwrap();
        assert_eq!(a, b);

        // 6 字符 * 10ms + 2 * 20ms = 100 个采样 @ 1kHz
        assert_eq!(a.len(), 200);
        assert_eq!(pcm_duration(a.len(), 1000).as_millis(), 100);
    }

    #[tokio::test]
    async fn test_padding_is_trimmable() {
        let audio = client().synthesize("Hello world.", 1.0).await.unwrap();
        assert!(trim_silence(&audio).len() < audio.len());
    }

    #[tokio::test]
    async fn test_speed_shortens_audio() {
        let client = client();
        let normal = client.synthesize("Hello.", 1.0).await.unwrap();
        let fast = client.synthesize("Hello.", 2.0).await.unwrap();
        assert!(fast.len() < normal.len());
    }

    #[tokio::test]
    async fn test_invalid_speed_rejected() {
        let client = client();
        assert!(matches!(
            client.synthesize("Hello.", 0.0).await,
            Err(TtsError::InvalidSpeed(_))
        ));
        assert!(client.set_speed(10.0).is_err());
        client.set_speed(1.5).unwrap();
        assert_eq!(client.speed(), 1.5);
    }

    #[tokio::test]
    async fn test_validate_and_name() {
        let client = client();
        assert!(client.validate().await.is_ok());
        assert!(client.is_available().await);
        assert_eq!(client.name(), "fake");
        assert_eq!(client.sample_rate(), 1000);
    }
}
