//! AudioQueue - 朗读音频队列
//!
//! 文本经分句后进入有界 intake 队列，由 intake 任务按序追加为 AudioSegment。
//! 当前片段之后的预读窗口被送入合成队列，由 worker 池并发合成。
//! 导航（next/previous/skip）只移动索引并重新触发预读，从不等待合成。

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

use super::config::AudioQueueConfig;
use super::inner::{run_intake, run_memory_manager, QueueInner, ReclaimReport};
use super::state::Transition;
use crate::application::ports::{
    AudioCachePort, CacheMetricsSnapshot, SentenceParserPort, TtsEnginePort,
};
use crate::application::QueueError;
use crate::domain::{AudioSegment, QueueState, TextSegment};
use crate::infrastructure::events::{QueueCallbacks, QueueEvent};
use crate::infrastructure::worker::run_worker;

/// 队列深度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    /// 已追加的片段总数
    pub total: usize,
    /// intake 队列中等待追加的片段
    pub pending_intake: usize,
    /// 合成队列中等待合成的片段
    pub pending_synthesis: usize,
    /// 当前片段之后的片段数
    pub ahead: usize,
}

/// 队列运行指标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueMetrics {
    pub state: QueueState,
    pub total_segments: usize,
    pub ready_segments: usize,
    pub current_index: isize,
    pub processed_count: u64,
    pub memory_usage: u64,
    pub max_memory_bytes: u64,
    pub pending_intake: usize,
    pub pending_synthesis: usize,
    pub pooled_segments: usize,
    pub cache: Option<CacheMetricsSnapshot>,
}

#[derive(Debug, Serialize)]
struct SegmentSnapshot {
    index: usize,
    id: String,
    position: u64,
    text: String,
    ready: bool,
    held_bytes: u64,
    duration_ms: u64,
    playing: bool,
    played: bool,
}

#[derive(Debug, Serialize)]
struct QueueSnapshot {
    metrics: QueueMetrics,
    /// 已被回收的片段不出现在这里
    segments: Vec<SegmentSnapshot>,
}

/// 朗读音频队列
pub struct AudioQueue {
    inner: Arc<QueueInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl AudioQueue {
    /// 创建队列并启动后台任务
    ///
    /// 必须在 tokio runtime 中调用。
    pub fn new(
        config: AudioQueueConfig,
        engine: Arc<dyn TtsEnginePort>,
        parser: Arc<dyn SentenceParserPort>,
        cache: Option<Arc<dyn AudioCachePort>>,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            QueueError::invalid_config("AudioQueue must be created inside a tokio runtime")
        })?;

        let worker_count = config.worker_count;
        let inner = Arc::new(QueueInner::new(config, engine, parser, cache));

        let mut tasks = Vec::with_capacity(worker_count + 2);
        for worker_id in 0..worker_count {
            tasks.push(runtime.spawn(run_worker(worker_id, inner.clone())));
        }
        tasks.push(runtime.spawn(run_intake(inner.clone())));
        tasks.push(runtime.spawn(run_memory_manager(inner.clone())));

        tracing::info!(
            engine = %inner.engine.name(),
            worker_count,
            lookahead_size = inner.config.lookahead_size,
            max_memory_bytes = inner.config.max_memory_bytes,
            cache = inner.cache.is_some(),
            "AudioQueue started"
        );

        Ok(Self {
            inner,
            tasks: Mutex::new(tasks),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// 分句后把每个句子放入 intake 队列，返回句子数
    ///
    /// intake 队列放不下整批句子时返回 `QueueFull`，不会只放入一部分。
    pub fn add_text(&self, text: &str) -> Result<usize, QueueError> {
        if self.is_stopped() {
            return Err(QueueError::Stopped);
        }

        let sentences = self.inner.parser.parse_sentences(text)?;
        if sentences.is_empty() {
            return Ok(0);
        }

        {
            let mut next_position = self.inner.lock_position();
            if sentences.len() > self.inner.intake_tx.capacity() {
                tracing::warn!(
                    sentences = sentences.len(),
                    available = self.inner.intake_tx.capacity(),
                    "Intake queue full"
                );
                return Err(QueueError::QueueFull);
            }

            let generation = self.inner.lock_shared().generation;
            for sentence in &sentences {
                let segment =
                    TextSegment::new(sentence.text.clone(), *next_position).with_generation(generation);
                self.inner.intake_tx.try_send(segment).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => QueueError::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => QueueError::Stopped,
                })?;
                *next_position += 1;
            }
        }

        let transition = {
            let mut shared = self.inner.lock_shared();
            if shared.state == QueueState::Idle {
                shared.set_state(QueueState::Processing)
            } else {
                None
            }
        };
        self.inner.publish(transition);

        tracing::debug!(sentences = sentences.len(), "Text queued");
        Ok(sentences.len())
    }

    /// 立即执行一次预读，返回送入合成队列的片段数
    pub fn preload(&self) -> usize {
        self.inner.schedule_lookahead()
    }

    /// 等待当前片段（导航前为任意片段）有音频
    pub async fn wait_for_ready(&self, timeout: Duration) -> Result<(), QueueError> {
        let deadline = Instant::now() + timeout;
        let mut ticker = tokio::time::interval(self.inner.config.wait_poll_interval);

        loop {
            if self.is_stopped() {
                return Err(QueueError::StoppedWhileWaiting);
            }
            let ready = self.inner.lock_shared().is_ready();
            if ready {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(QueueError::Timeout(timeout));
            }

            tokio::select! {
                _ = self.inner.shutdown.cancelled() => return Err(QueueError::StoppedWhileWaiting),
                _ = ticker.tick() => {}
            }
        }
    }

    /// 当前片段的快照
    pub fn current(&self) -> Result<AudioSegment, QueueError> {
        self.inner.lock_shared().current().cloned()
    }

    pub fn next(&self) -> Result<AudioSegment, QueueError> {
        let (segment, transition) = self.inner.lock_shared().next()?;
        self.after_navigation(transition);
        Ok(segment)
    }

    pub fn previous(&self) -> Result<AudioSegment, QueueError> {
        let segment = self.inner.lock_shared().previous()?;
        self.after_navigation(None);
        Ok(segment)
    }

    /// 相对移动 n 个片段，越界时截断到首尾
    pub fn skip(&self, n: isize) -> Result<AudioSegment, QueueError> {
        let (segment, transition) = self.inner.lock_shared().skip(n)?;
        self.after_navigation(transition);
        Ok(segment)
    }

    fn after_navigation(&self, transition: Transition) {
        self.inner.publish(transition);
        self.inner.schedule_lookahead();
    }

    /// 清空队列
    ///
    /// 尽力丢弃待处理项；仍在途的 intake 片段因代数不同而被丢弃。
    pub fn clear(&self) {
        let drained = self.inner.drain_pending();

        let (segments, transition) = {
            let mut position = self.inner.lock_position();
            let mut shared = self.inner.lock_shared();
            *position = 0;
            let reset = shared.reset();
            self.inner.memory_usage.store(0, Ordering::Release);
            self.inner.processed_count.store(0, Ordering::Release);
            reset
        };

        let removed = segments.len();
        for segment in segments {
            self.inner.pool.release(segment);
        }
        self.inner.publish(transition);

        tracing::debug!(removed, drained, "Queue cleared");
    }

    pub fn pause(&self) -> Result<(), QueueError> {
        let transition = self.inner.lock_shared().pause()?;
        self.inner.publish(transition);
        Ok(())
    }

    pub fn resume(&self) -> Result<(), QueueError> {
        let transition = self.inner.lock_shared().resume()?;
        self.inner.publish(transition);
        self.inner.schedule_lookahead();
        Ok(())
    }

    /// 停止队列（幂等）
    ///
    /// 取消所有后台任务并在 `stop_timeout` 内等待其退出，随后清空队列。
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let transition = self.inner.lock_shared().set_state(QueueState::Stopped);
        self.inner.publish(transition);
        self.inner.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();
        let timeout = self.inner.config.stop_timeout;
        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Queue task join failed");
                    }
                }
            }
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Timed out waiting for queue tasks, aborting");
                for abort in aborts {
                    abort.abort();
                }
            }
        }

        self.clear();
        tracing::info!("AudioQueue stopped");
    }

    pub fn queue_depth(&self) -> QueueDepth {
        let shared = self.inner.lock_shared();
        let total = shared.len();
        let consumed = (shared.current_index + 1).max(0) as usize;
        QueueDepth {
            total,
            pending_intake: self.inner.pending_intake(),
            pending_synthesis: self.inner.pending_synthesis(),
            ahead: total.saturating_sub(consumed),
        }
    }

    pub fn memory_usage(&self) -> u64 {
        self.inner.memory_usage.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> QueueMetrics {
        let (state, total_segments, ready_segments, current_index) = {
            let shared = self.inner.lock_shared();
            (
                shared.state,
                shared.len(),
                shared.segments.values().filter(|s| s.is_ready()).count(),
                shared.current_index,
            )
        };

        QueueMetrics {
            state,
            total_segments,
            ready_segments,
            current_index,
            processed_count: self.inner.processed_count.load(Ordering::Acquire),
            memory_usage: self.memory_usage(),
            max_memory_bytes: self.inner.config.max_memory_bytes,
            pending_intake: self.inner.pending_intake(),
            pending_synthesis: self.inner.pending_synthesis(),
            pooled_segments: self.inner.pool.len(),
            cache: self.inner.cache.as_ref().map(|c| c.metrics()),
        }
    }

    /// 导出队列状态（格式化 JSON）
    pub fn dump_state(&self) -> String {
        let metrics = self.metrics();
        let segments = {
            let shared = self.inner.lock_shared();
            shared
                .order
                .iter()
                .enumerate()
                .filter_map(|(index, id)| {
                    shared.segments.get(id).map(|s| SegmentSnapshot {
                        index,
                        id: s.id.clone(),
                        position: s.position,
                        text: s.text.clone(),
                        ready: s.is_ready(),
                        held_bytes: s.held_bytes(),
                        duration_ms: s.duration.as_millis() as u64,
                        playing: s.playing,
                        played: s.played,
                    })
                })
                .collect()
        };

        let snapshot = QueueSnapshot { metrics, segments };
        let dump = serde_json::to_string_pretty(&snapshot)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
        tracing::debug!(state = %dump, "AudioQueue state dump");
        dump
    }

    pub fn set_callbacks(&self, callbacks: QueueCallbacks) {
        self.inner.events.set_callbacks(callbacks);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    pub fn segment_at(&self, index: usize) -> Option<AudioSegment> {
        self.inner.lock_shared().segment_at(index).cloned()
    }

    /// 按顺序返回所有仍在队列中的片段
    pub fn segments(&self) -> Vec<AudioSegment> {
        let shared = self.inner.lock_shared();
        shared
            .order
            .iter()
            .filter_map(|id| shared.segments.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock_shared().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock_shared().state
    }

    pub fn current_index(&self) -> isize {
        self.inner.lock_shared().current_index
    }

    /// 立即执行一次内存回收
    pub fn reclaim_memory(&self) -> ReclaimReport {
        self.inner.reclaim_memory()
    }

    /// 所有片段实际持有的音频字节数（用于校验计数）
    pub fn held_bytes(&self) -> u64 {
        self.inner.lock_shared().held_bytes()
    }
}

impl Drop for AudioQueue {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}
