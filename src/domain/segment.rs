//! Segment Entities - 朗读片段
//!
//! TextSegment 是 add_text 产生的临时对象，进入 intake 队列后被转换为 AudioSegment。
//! AudioSegment 由 AudioQueue 持有，worker 写入音频，导航修改 playing/played。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 队列状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// 空闲（尚未添加文本或刚被清空）
    Idle,
    /// 已有文本，正在合成
    Processing,
    /// 正在播放
    Playing,
    /// 暂停
    Paused,
    /// 已停止（终态）
    Stopped,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Idle => "idle",
            QueueState::Processing => "processing",
            QueueState::Playing => "playing",
            QueueState::Paused => "paused",
            QueueState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 待合成的文本片段
#[derive(Debug, Clone)]
pub struct TextSegment {
    pub id: String,
    pub text: String,
    pub position: u64,
    pub priority: i32,
    /// 创建时的队列代数，clear() 之后旧代数的片段会被丢弃
    pub(crate) generation: u64,
}

impl TextSegment {
    pub fn new(text: impl Into<String>, position: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            position,
            priority: 0,
            generation: 0,
        }
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

/// 音频片段
///
/// 音频缓冲使用 `Arc<Vec<u8>>` 共享，调用方拿到的是快照，克隆开销很小。
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub id: String,
    pub text: String,
    pub position: u64,
    pub raw_audio: Option<Arc<Vec<u8>>>,
    pub processed_audio: Option<Arc<Vec<u8>>>,
    pub duration: Duration,
    pub synthesized_at: Option<DateTime<Utc>>,
    pub last_accessed: DateTime<Utc>,
    pub playing: bool,
    pub played: bool,
}

impl AudioSegment {
    pub fn from_text(segment: TextSegment) -> Self {
        Self {
            id: segment.id,
            text: segment.text,
            position: segment.position,
            raw_audio: None,
            processed_audio: None,
            duration: Duration::ZERO,
            synthesized_at: None,
            last_accessed: Utc::now(),
            playing: false,
            played: false,
        }
    }

    /// 可播放的音频（优先返回处理后的音频）
    pub fn audio(&self) -> Option<&Arc<Vec<u8>>> {
        self.processed_audio.as_ref().or(self.raw_audio.as_ref())
    }

    pub fn is_ready(&self) -> bool {
        self.audio().is_some()
    }

    /// 当前持有的音频字节数（raw + processed）
    pub fn held_bytes(&self) -> u64 {
        let raw = self.raw_audio.as_ref().map_or(0, |a| a.len());
        let processed = self.processed_audio.as_ref().map_or(0, |a| a.len());
        (raw + processed) as u64
    }

    /// 释放音频数据，返回释放的字节数
    pub fn release_audio(&mut self) -> u64 {
        let freed = self.held_bytes();
        self.raw_audio = None;
        self.processed_audio = None;
        freed
    }

    /// 重置为可复用的空片段（对象池使用）
    pub(crate) fn reset(&mut self) {
        self.id.clear();
        self.text.clear();
        self.position = 0;
        self.raw_audio = None;
        self.processed_audio = None;
        self.duration = Duration::ZERO;
        self.synthesized_at = None;
        self.playing = false;
        self.played = false;
    }

    /// 用新的文本片段填充复用的对象
    pub(crate) fn refill(&mut self, segment: TextSegment) {
        self.reset();
        self.id = segment.id;
        self.text = segment.text;
        self.position = segment.position;
        self.last_accessed = Utc::now();
    }
}
