//! Event Publisher Implementation
//!
//! 队列事件通过两种方式发出：可选的回调，以及 broadcast 通道

use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::domain::QueueState;

/// 状态变更回调 (from, to)
pub type StateChangeCallback = Arc<dyn Fn(QueueState, QueueState) + Send + Sync>;
/// 进度回调 (已合成数量, 片段总数)
pub type ProgressCallback = Arc<dyn Fn(u64, usize) + Send + Sync>;
/// 片段错误回调 (segment_id, 错误信息)
pub type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// 队列事件类型
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum QueueEvent {
    /// 队列状态变更
    StateChanged { from: QueueState, to: QueueState },
    /// 合成进度
    Progress { processed: u64, total: usize },
    /// 片段合成失败
    SegmentError { segment_id: String, error: String },
}

/// 可选回调集合
#[derive(Clone, Default)]
pub struct QueueCallbacks {
    pub on_state_change: Option<StateChangeCallback>,
    pub on_progress: Option<ProgressCallback>,
    pub on_error: Option<ErrorCallback>,
}

/// 事件发布器
pub struct EventPublisher {
    callbacks: RwLock<QueueCallbacks>,
    channel: broadcast::Sender<QueueEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            callbacks: RwLock::new(QueueCallbacks::default()),
            channel: tx,
        }
    }

    /// 替换回调
    pub fn set_callbacks(&self, callbacks: QueueCallbacks) {
        *self
            .callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = callbacks;
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.channel.subscribe()
    }

    fn callbacks(&self) -> QueueCallbacks {
        self.callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 发布状态变更事件
    pub fn publish_state_changed(&self, from: QueueState, to: QueueState) {
        if let Some(callback) = self.callbacks().on_state_change {
            callback(from, to);
        }
        self.broadcast(QueueEvent::StateChanged { from, to });
    }

    /// 发布合成进度事件
    pub fn publish_progress(&self, processed: u64, total: usize) {
        if let Some(callback) = self.callbacks().on_progress {
            callback(processed, total);
        }
        self.broadcast(QueueEvent::Progress { processed, total });
    }

    /// 发布片段失败事件
    pub fn publish_segment_error(&self, segment_id: &str, error: &str) {
        if let Some(callback) = self.callbacks().on_error {
            callback(segment_id, error);
        }
        self.broadcast(QueueEvent::SegmentError {
            segment_id: segment_id.to_string(),
            error: error.to_string(),
        });
    }

    fn broadcast(&self, event: QueueEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::trace!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
