//! Narrator - 朗读音频流水线
//!
//! 组合根：加载配置，初始化日志，显式组装缓存、引擎、分句器和队列，
//! 读取文本文件并按顺序走完整个队列（没有音频设备，按片段时长模拟播放）。

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use narrator::application::ports::{AudioCachePort, TtsEnginePort};
use narrator::application::QueueError;
use narrator::config::{load_config, print_config, AppConfig, EngineKind};
use narrator::infrastructure::adapters::{
    FakeTtsClient, FakeTtsClientConfig, HttpTtsClient, HttpTtsClientConfig,
    PunctuationSentenceParser,
};
use narrator::infrastructure::{AudioQueue, CacheManager, QueueCallbacks};

/// 单个片段等待合成的最长时间
const READY_TIMEOUT: Duration = Duration::from_secs(60);

fn build_engine(config: &AppConfig) -> anyhow::Result<Arc<dyn TtsEnginePort>> {
    let engine = &config.engine;
    let engine: Arc<dyn TtsEnginePort> = match engine.kind {
        EngineKind::Fake => {
            let mut fake = FakeTtsClientConfig {
                sample_rate: engine.sample_rate,
                latency: Duration::from_millis(engine.fake_latency_ms),
                ..Default::default()
            };
            if let Some(name) = &engine.name {
                fake.name = name.clone();
            }
            Arc::new(FakeTtsClient::new(fake))
        }
        EngineKind::Http => {
            let mut http = HttpTtsClientConfig::new(&engine.url).with_timeout(engine.timeout_secs);
            http.sample_rate = engine.sample_rate;
            if let Some(name) = &engine.name {
                http = http.with_name(name);
            }
            Arc::new(HttpTtsClient::new(http)?)
        }
    };
    Ok(engine)
}

/// intake 满时的重试次数和间隔
const FEED_RETRIES: u32 = 100;
const FEED_BACKOFF: Duration = Duration::from_millis(50);

/// 逐行送入队列，intake 满时退避重试
async fn feed_text(queue: &AudioQueue, text: &str) -> anyhow::Result<usize> {
    let mut total = 0;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut attempts = 0;
        loop {
            match queue.add_text(line) {
                Ok(sentences) => {
                    total += sentences;
                    break;
                }
                Err(QueueError::QueueFull) if attempts < FEED_RETRIES => {
                    attempts += 1;
                    tokio::time::sleep(FEED_BACKOFF).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(total)
}

/// 按顺序播放整个队列
async fn play_through(queue: &AudioQueue, expected: usize) -> anyhow::Result<()> {
    loop {
        let segment = match queue.next() {
            Ok(segment) => segment,
            // intake 是异步的，片段可能还没追加
            Err(QueueError::EndOfQueue) if queue.len() < expected => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
            Err(QueueError::EndOfQueue) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        queue.wait_for_ready(READY_TIMEOUT).await?;
        let segment = queue.current().unwrap_or(segment);

        tracing::info!(
            position = segment.position,
            duration_ms = segment.duration.as_millis() as u64,
            text = %segment.text,
            "Playing segment"
        );
        tokio::time::sleep(segment.duration).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!("{},narrator={}", config.log.level, config.log.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Narrator - TTS 朗读流水线");
    print_config(&config);

    let input = std::env::args()
        .nth(1)
        .context("usage: narrator <text-file>")?;
    let text = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read {}", input))?;

    // 创建缓存
    let cache: Option<Arc<CacheManager>> = if config.cache.enabled {
        Some(CacheManager::open(config.cache.to_manager_config()).await?)
    } else {
        None
    };

    // 创建 TTS 引擎
    let engine = build_engine(&config)?;
    if let Err(e) = engine.validate().await {
        tracing::warn!(engine = %engine.name(), error = %e, "TTS engine validation failed");
    }

    // 创建分句器和队列
    let parser = Arc::new(PunctuationSentenceParser::with_config(
        config.parser.to_segment_config(),
    ));
    let queue = AudioQueue::new(
        config.queue.to_queue_config(),
        engine,
        parser,
        cache.clone().map(|c| c as Arc<dyn AudioCachePort>),
    )?;

    queue.set_callbacks(QueueCallbacks {
        on_state_change: Some(Arc::new(|from, to| {
            tracing::info!(from = %from, to = %to, "Queue state changed");
        })),
        on_progress: Some(Arc::new(|processed, total| {
            tracing::debug!(processed, total, "Synthesis progress");
        })),
        on_error: Some(Arc::new(|segment_id, error| {
            tracing::warn!(segment_id = %segment_id, error = %error, "Segment synthesis failed");
        })),
    });

    // 播放（带 ctrl-c 中断）
    tokio::select! {
        result = async {
            let sentences = feed_text(&queue, &text).await?;
            tracing::info!(sentences, file = %input, "Text loaded");
            play_through(&queue, sentences).await
        } => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Received shutdown signal"),
    }

    let metrics = queue.metrics();
    tracing::info!(
        processed = metrics.processed_count,
        memory_usage = metrics.memory_usage,
        "Playback finished"
    );
    queue.dump_state();

    queue.stop().await;
    if let Some(cache) = cache {
        if let Some(snapshot) = &metrics.cache {
            tracing::info!(hit_rate = snapshot.hit_rate, writes = snapshot.writes, "Cache summary");
        }
        cache.close().await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
