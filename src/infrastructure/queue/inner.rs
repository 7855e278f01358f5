//! Queue Internals
//!
//! AudioQueue 与后台任务（intake、worker、内存管理）共享的状态。
//! 结构锁只在同步代码中持有，不跨越 await。

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::config::AudioQueueConfig;
use super::state::{QueueShared, Transition};
use crate::application::ports::{AudioCachePort, SentenceParserPort, TtsEnginePort};
use crate::domain::{AudioPreprocessor, TextSegment};
use crate::infrastructure::events::EventPublisher;
use crate::infrastructure::memory::SegmentPool;

/// 触发回收的内存占用比例
const RECLAIM_THRESHOLD: f64 = 0.9;

/// 单次内存回收的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    /// 释放的音频字节数
    pub freed_bytes: u64,
    /// 从队列移除并归还对象池的片段数
    pub released_segments: usize,
    /// 仍超限时从对象池丢弃的对象数
    pub pool_shrunk: usize,
}

pub(crate) struct QueueInner {
    pub config: AudioQueueConfig,
    pub engine: Arc<dyn TtsEnginePort>,
    pub parser: Arc<dyn SentenceParserPort>,
    pub cache: Option<Arc<dyn AudioCachePort>>,
    pub preprocessor: AudioPreprocessor,
    pub shared: Mutex<QueueShared>,
    /// 所有片段持有的音频字节数，只在结构锁内修改
    pub memory_usage: AtomicU64,
    pub processed_count: AtomicU64,
    /// 下一个 TextSegment 的位置，同时串行化 add_text
    pub next_position: Mutex<u64>,
    pub intake_tx: mpsc::Sender<TextSegment>,
    pub intake_rx: tokio::sync::Mutex<mpsc::Receiver<TextSegment>>,
    pub synth_tx: mpsc::Sender<String>,
    pub synth_rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    pub pool: SegmentPool,
    pub events: EventPublisher,
    pub shutdown: CancellationToken,
}

impl QueueInner {
    pub fn new(
        config: AudioQueueConfig,
        engine: Arc<dyn TtsEnginePort>,
        parser: Arc<dyn SentenceParserPort>,
        cache: Option<Arc<dyn AudioCachePort>>,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity);
        let (synth_tx, synth_rx) = mpsc::channel(config.synthesis_capacity);
        Self {
            preprocessor: config.preprocessor,
            pool: SegmentPool::new(config.pool_capacity),
            config,
            engine,
            parser,
            cache,
            shared: Mutex::new(QueueShared::new()),
            memory_usage: AtomicU64::new(0),
            processed_count: AtomicU64::new(0),
            next_position: Mutex::new(0),
            intake_tx,
            intake_rx: tokio::sync::Mutex::new(intake_rx),
            synth_tx,
            synth_rx: tokio::sync::Mutex::new(synth_rx),
            events: EventPublisher::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn lock_shared(&self) -> MutexGuard<'_, QueueShared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lock_position(&self) -> MutexGuard<'_, u64> {
        self.next_position
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn publish(&self, transition: Transition) {
        if let Some((from, to)) = transition {
            tracing::debug!(from = %from, to = %to, "Queue state changed");
            self.events.publish_state_changed(from, to);
        }
    }

    /// 片段仍存在且没有音频时返回其文本
    pub fn pending_text(&self, segment_id: &str) -> Option<String> {
        let shared = self.lock_shared();
        shared
            .segments
            .get(segment_id)
            .filter(|s| !s.is_ready())
            .map(|s| s.text.clone())
    }

    /// 写回合成结果，返回 (已合成数, 片段总数)
    ///
    /// 片段已不在队列中时返回 None。内存计数按差值调整，
    /// 重复合成同一片段时计数仍然准确。
    pub fn store_audio(
        &self,
        segment_id: &str,
        raw: Vec<u8>,
        processed: Vec<u8>,
        duration: Duration,
    ) -> Option<(u64, usize)> {
        let mut shared = self.lock_shared();
        let total = shared.len();
        let segment = shared.segments.get_mut(segment_id)?;

        let before = segment.held_bytes();
        segment.raw_audio = Some(Arc::new(raw));
        segment.processed_audio = Some(Arc::new(processed));
        segment.duration = duration;
        segment.synthesized_at = Some(Utc::now());
        let after = segment.held_bytes();

        if after >= before {
            self.memory_usage.fetch_add(after - before, Ordering::AcqRel);
        } else {
            self.memory_usage.fetch_sub(before - after, Ordering::AcqRel);
        }

        let processed_count = if before == 0 {
            self.processed_count.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.processed_count.load(Ordering::Acquire)
        };
        Some((processed_count, total))
    }

    /// 把预读窗口内缺音频的片段送入合成队列
    ///
    /// 合成队列满时停止本轮，剩余片段等下一次触发。
    pub fn schedule_lookahead(&self) -> usize {
        let candidates = {
            let shared = self.lock_shared();
            if shared.ensure_active().is_err() {
                return 0;
            }
            shared.lookahead_candidates(self.config.lookahead_size)
        };

        let mut scheduled = 0;
        for segment_id in candidates {
            match self.synth_tx.try_send(segment_id) {
                Ok(()) => scheduled += 1,
                Err(mpsc::error::TrySendError::Full(segment_id)) => {
                    tracing::debug!(segment_id = %segment_id, "Synthesis queue full, deferring lookahead");
                    break;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
        scheduled
    }

    /// intake 片段转为 AudioSegment 并追加到队尾
    pub fn append_segment(&self, segment: TextSegment) -> bool {
        let generation = segment.generation;
        let audio_segment = self.pool.acquire(segment);

        {
            let mut shared = self.lock_shared();
            if shared.generation != generation {
                drop(shared);
                tracing::trace!(segment_id = %audio_segment.id, "Dropping segment from cleared generation");
                self.pool.release(audio_segment);
                return false;
            }
            shared.order.push(audio_segment.id.clone());
            shared.segments.insert(audio_segment.id.clone(), audio_segment);
        }

        self.schedule_lookahead();
        true
    }

    /// 内存回收
    ///
    /// 占用达到上限的 90% 时，释放 `current_index - retention_period` 之前已播放片段的音频；
    /// 不在播放中的片段同时移出队列并归还对象池。仍然超限时清空对象池。
    pub fn reclaim_memory(&self) -> ReclaimReport {
        let max = self.config.max_memory_bytes;
        let usage = self.memory_usage.load(Ordering::Acquire);
        if (usage as f64) < max as f64 * RECLAIM_THRESHOLD {
            return ReclaimReport::default();
        }

        let mut report = ReclaimReport::default();
        let mut released = Vec::new();
        {
            let mut shared = self.lock_shared();
            let cutoff = shared.current_index - self.config.retention_period as isize;
            if cutoff > 0 {
                let cutoff = (cutoff as usize).min(shared.order.len());
                let candidates: Vec<String> = shared.order[..cutoff].to_vec();
                for segment_id in candidates {
                    let Some(segment) = shared.segments.get_mut(&segment_id) else {
                        continue;
                    };
                    if !segment.played {
                        continue;
                    }

                    let freed = segment.release_audio();
                    self.memory_usage.fetch_sub(freed, Ordering::AcqRel);
                    report.freed_bytes += freed;

                    if !segment.playing {
                        if let Some(segment) = shared.segments.remove(&segment_id) {
                            released.push(segment);
                        }
                    }
                }
            }
        }

        report.released_segments = released.len();
        for segment in released {
            self.pool.release(segment);
        }

        let remaining = self.memory_usage.load(Ordering::Acquire);
        if remaining > max {
            report.pool_shrunk = self.pool.shrink();
            tracing::warn!(
                memory_usage = remaining,
                max_memory_bytes = max,
                pool_shrunk = report.pool_shrunk,
                "Memory still above limit after reclaim"
            );
        }

        tracing::debug!(
            freed_bytes = report.freed_bytes,
            released_segments = report.released_segments,
            memory_usage = remaining,
            "Memory reclaim finished"
        );
        report
    }

    /// 尽力丢弃两个队列中尚未处理的项
    pub fn drain_pending(&self) -> usize {
        let mut drained = 0;
        if let Ok(mut rx) = self.intake_rx.try_lock() {
            while rx.try_recv().is_ok() {
                drained += 1;
            }
        }
        if let Ok(mut rx) = self.synth_rx.try_lock() {
            while rx.try_recv().is_ok() {
                drained += 1;
            }
        }
        drained
    }

    pub fn pending_intake(&self) -> usize {
        self.config.intake_capacity - self.intake_tx.capacity()
    }

    pub fn pending_synthesis(&self) -> usize {
        self.config.synthesis_capacity - self.synth_tx.capacity()
    }
}

/// intake 任务：按到达顺序把 TextSegment 追加到队列
pub(crate) async fn run_intake(inner: Arc<QueueInner>) {
    tracing::debug!("Intake task started");

    loop {
        let next = tokio::select! {
            _ = inner.shutdown.cancelled() => None,
            segment = async { inner.intake_rx.lock().await.recv().await } => segment,
        };
        let Some(segment) = next else { break };
        inner.append_segment(segment);
    }

    tracing::debug!("Intake task stopped");
}

/// 内存管理任务：按固定间隔检查占用
pub(crate) async fn run_memory_manager(inner: Arc<QueueInner>) {
    let mut ticker = tokio::time::interval(inner.config.memory_check_interval);
    // 第一次 tick 立即返回，跳过
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                inner.reclaim_memory();
            }
        }
    }

    tracing::debug!("Memory manager stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::{
        FakeTtsClient, FakeTtsClientConfig, PunctuationSentenceParser,
    };

    fn inner() -> QueueInner {
        QueueInner::new(
            AudioQueueConfig::default(),
            Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default())),
            Arc::new(PunctuationSentenceParser::new()),
            None,
        )
    }

    #[test]
    fn test_repeated_store_adjusts_by_delta() {
        let inner = inner();
        let segment = TextSegment::new("Twice.", 0);
        let segment_id = segment.id.clone();
        assert!(inner.append_segment(segment));

        let first = inner.store_audio(&segment_id, vec![0; 100], vec![0; 100], Duration::ZERO);
        assert_eq!(first, Some((1, 1)));
        assert_eq!(inner.memory_usage.load(Ordering::Acquire), 200);

        // 第二次写回同一片段：计数按差值调整，已合成数不重复累加
        let second = inner.store_audio(&segment_id, vec![0; 40], vec![0; 60], Duration::ZERO);
        assert_eq!(second, Some((1, 1)));
        assert_eq!(inner.memory_usage.load(Ordering::Acquire), 100);
        assert_eq!(inner.lock_shared().held_bytes(), 100);
        assert_eq!(inner.processed_count.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_store_for_missing_segment_is_ignored() {
        let inner = inner();
        assert!(inner
            .store_audio("gone", vec![0; 10], vec![0; 10], Duration::ZERO)
            .is_none());
        assert_eq!(inner.memory_usage.load(Ordering::Acquire), 0);
    }
}
