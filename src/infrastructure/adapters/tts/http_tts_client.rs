//! HTTP TTS Client - 调用外部 TTS HTTP 服务
//!
//! 实现 TtsEnginePort trait，通过 HTTP 调用外部 TTS 服务
//!
//! 外部 TTS API:
//! POST {base_url}/api/tts/synthesize
//! Request: {"text": "...", "speed": 1.0, "voice": "..."}  (JSON)
//! Response: audio/wav 或裸 16-bit PCM

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::wav::extract_pcm;
use crate::application::ports::{validate_speed, TtsEnginePort, TtsError, DEFAULT_SAMPLE_RATE};

/// TTS 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct TtsHttpRequest<'a> {
    text: &'a str,
    speed: f32,
    voice: &'a str,
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 引擎名称，也作为请求中的 voice
    pub name: String,
    /// 服务返回裸 PCM 时使用的采样率
    pub sample_rate: u32,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
            name: "http".to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// HTTP TTS 客户端
///
/// 通过 HTTP 调用外部 TTS 服务
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
    speed: AtomicU32,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            speed: AtomicU32::new(1.0f32.to_bits()),
        })
    }

    /// 使用默认配置创建客户端
    pub fn with_default_config() -> Result<Self, TtsError> {
        Self::new(HttpTtsClientConfig::default())
    }

    /// set_speed 设置的默认语速
    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Relaxed))
    }

    /// 获取合成 URL
    fn synthesize_url(&self) -> String {
        format!("{}/api/tts/synthesize", self.config.base_url.trim_end_matches('/'))
    }

    /// 获取健康检查 URL
    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url.trim_end_matches('/'))
    }

    /// 响应体转为 PCM；WAV 的采样率与配置不一致时只记录警告
    fn decode_body(&self, body: &[u8]) -> Result<Vec<u8>, TtsError> {
        if !body.starts_with(b"RIFF") {
            return Ok(body[..body.len() & !1].to_vec());
        }

        let (pcm, sample_rate) = extract_pcm(body)?;
        if sample_rate != self.config.sample_rate {
            tracing::warn!(
                expected = self.config.sample_rate,
                actual = sample_rate,
                "TTS service sample rate differs from configuration"
            );
        }
        Ok(pcm)
    }
}

fn map_request_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
    } else {
        TtsError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn synthesize(&self, text: &str, speed: f32) -> Result<Vec<u8>, TtsError> {
        validate_speed(speed)?;

        let http_request = TtsHttpRequest {
            text,
            speed,
            voice: &self.config.name,
        };

        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = text.len(),
            speed,
            "Sending TTS synthesize request"
        );

        let response = self
            .client
            .post(self.synthesize_url())
            .json(&http_request)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?;
        let pcm = self.decode_body(&body)?;

        tracing::debug!(
            body_size = body.len(),
            pcm_size = pcm.len(),
            "TTS synthesis completed"
        );

        Ok(pcm)
    }

    fn set_speed(&self, speed: f32) -> Result<(), TtsError> {
        validate_speed(speed)?;
        self.speed.store(speed.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    async fn validate(&self) -> Result<(), TtsError> {
        let response = self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| TtsError::Unavailable(map_request_error(e).to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TtsError::Unavailable(format!(
                "health check returned HTTP {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn is_available(&self) -> bool {
        self.validate().await.is_ok()
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::tts::wav::build_wav;

    #[test]
    fn test_config_default() {
        let config = HttpTtsClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_config_builder() {
        let config = HttpTtsClientConfig::new("http://example.com:9000/")
            .with_timeout(60)
            .with_name("narrator-voice");
        assert_eq!(config.timeout_secs, 60);

        let client = HttpTtsClient::new(config).unwrap();
        assert_eq!(client.synthesize_url(), "http://example.com:9000/api/tts/synthesize");
        assert_eq!(client.health_url(), "http://example.com:9000/health");
        assert_eq!(client.name(), "narrator-voice");
    }

    #[test]
    fn test_decode_wav_and_raw_bodies() {
        let client = HttpTtsClient::with_default_config().unwrap();
        let pcm = vec![1u8, 0, 2, 0, 3, 0];

        let wav = build_wav(&pcm, DEFAULT_SAMPLE_RATE, 1);
        assert_eq!(client.decode_body(&wav).unwrap(), pcm);

        // 奇数长度的裸 PCM 丢掉最后一个字节
        assert_eq!(client.decode_body(&[1, 0, 2]).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_set_speed_validates() {
        let client = HttpTtsClient::with_default_config().unwrap();
        assert!(matches!(client.set_speed(0.1), Err(TtsError::InvalidSpeed(_))));
        client.set_speed(2.0).unwrap();
        assert_eq!(client.speed(), 2.0);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let config = HttpTtsClientConfig::new("http://127.0.0.1:9").with_timeout(1);
        let client = HttpTtsClient::new(config).unwrap();
        assert!(!client.is_available().await);
        assert!(client.synthesize("Hello.", 1.0).await.is_err());
    }
}
