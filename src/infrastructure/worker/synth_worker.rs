//! Synthesis Worker - 后台 TTS 合成
//!
//! 多个 worker 共享同一个合成队列接收端。每个片段的处理流程:
//! 1. 重新读取片段，已被清除或已有音频的直接跳过
//! 2. 计算缓存指纹，命中则跳过合成
//! 3. 调用 TTS 引擎，成功后写入缓存
//! 4. 预处理（静音裁剪 + 归一化），写回片段
//! 5. 触发下一轮预读，发布进度

use std::sync::Arc;

use crate::application::ports::{AudioData, CacheError, TtsError};
use crate::domain::{fingerprint, pcm_duration};
use crate::infrastructure::queue::QueueInner;

/// 合成与缓存使用的规范语速，播放语速由调用方处理
pub const CANONICAL_SPEED: f32 = 1.0;

/// Worker 主循环，直到取消或合成队列关闭
pub(crate) async fn run_worker(worker_id: usize, inner: Arc<QueueInner>) {
    tracing::debug!(worker_id, "SynthWorker started");

    loop {
        let next = tokio::select! {
            _ = inner.shutdown.cancelled() => None,
            id = async { inner.synth_rx.lock().await.recv().await } => id,
        };
        let Some(segment_id) = next else { break };

        process_segment(worker_id, &inner, &segment_id).await;
    }

    tracing::debug!(worker_id, "SynthWorker stopped");
}

/// 处理单个片段
async fn process_segment(worker_id: usize, inner: &QueueInner, segment_id: &str) {
    // Check 1: 片段仍存在且没有音频
    let Some(text) = inner.pending_text(segment_id) else {
        tracing::trace!(worker_id, segment_id = %segment_id, "Segment gone or ready, skipping");
        return;
    };

    let voice = inner.engine.name().to_string();
    let cache_key = fingerprint(&text, &voice, CANONICAL_SPEED);

    // Check 2: 缓存
    let raw = match lookup_cache(inner, &cache_key).await {
        Some(audio) => {
            tracing::debug!(worker_id, segment_id = %segment_id, "Cache hit");
            audio
        }
        None => match synthesize(inner, &text).await {
            Ok(audio) => {
                store_in_cache(inner, &cache_key, &audio, &text, &voice).await;
                audio
            }
            Err(e) => {
                tracing::warn!(
                    worker_id,
                    segment_id = %segment_id,
                    error = %e,
                    "TTS synthesis failed"
                );
                inner.events.publish_segment_error(segment_id, &e.to_string());
                return;
            }
        },
    };

    let processed = inner.preprocessor.process(&raw);
    let duration = pcm_duration(processed.len(), inner.engine.sample_rate());

    // Check 3: 合成期间片段可能已被 clear 或回收
    let Some((processed_count, total)) = inner.store_audio(segment_id, raw, processed, duration)
    else {
        tracing::debug!(worker_id, segment_id = %segment_id, "Segment removed during synthesis, dropping audio");
        return;
    };

    tracing::debug!(
        worker_id,
        segment_id = %segment_id,
        duration_ms = duration.as_millis() as u64,
        "Segment synthesized"
    );

    inner.schedule_lookahead();
    inner.events.publish_progress(processed_count, total);
}

async fn synthesize(inner: &QueueInner, text: &str) -> Result<Vec<u8>, TtsError> {
    let audio = inner.engine.synthesize(text, CANONICAL_SPEED).await?;
    if audio.is_empty() {
        return Err(TtsError::InvalidResponse("engine returned empty audio".to_string()));
    }
    Ok(audio)
}

async fn lookup_cache(inner: &QueueInner, cache_key: &str) -> Option<Vec<u8>> {
    let cache = inner.cache.as_ref()?;
    match cache.get(cache_key).await {
        Ok(data) => Some(data.audio),
        Err(CacheError::Miss) => None,
        Err(e) => {
            tracing::warn!(cache_key = %cache_key, error = %e, "Cache lookup failed");
            None
        }
    }
}

async fn store_in_cache(inner: &QueueInner, cache_key: &str, audio: &[u8], text: &str, voice: &str) {
    let Some(cache) = inner.cache.as_ref() else {
        return;
    };
    let data = AudioData::new(cache_key, audio.to_vec(), text, voice, CANONICAL_SPEED);
    if let Err(e) = cache.put(cache_key, data).await {
        tracing::warn!(cache_key = %cache_key, error = %e, "Failed to cache audio");
    }
}
