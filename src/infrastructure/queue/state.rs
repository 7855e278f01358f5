//! Queue Structural State
//!
//! 片段表、顺序、当前索引和队列状态，全部由 AudioQueue 的结构锁保护。
//! 这里的方法不做 I/O，不发事件，只返回需要发布的状态变更。

use chrono::Utc;
use std::collections::HashMap;

use crate::application::QueueError;
use crate::domain::{AudioSegment, QueueState};

/// 状态变更 (from, to)
pub(crate) type Transition = Option<(QueueState, QueueState)>;

pub(crate) struct QueueShared {
    pub segments: HashMap<String, AudioSegment>,
    /// 只追加，反映到达顺序
    pub order: Vec<String>,
    /// -1 表示尚未导航
    pub current_index: isize,
    pub state: QueueState,
    /// 暂停前的状态，resume 时恢复
    paused_from: Option<QueueState>,
    /// clear() 时递增，旧代数的 intake 片段被丢弃
    pub generation: u64,
}

impl QueueShared {
    pub fn new() -> Self {
        Self {
            segments: HashMap::new(),
            order: Vec::new(),
            current_index: -1,
            state: QueueState::Idle,
            paused_from: None,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn set_state(&mut self, to: QueueState) -> Transition {
        if self.state == to {
            return None;
        }
        let from = std::mem::replace(&mut self.state, to);
        Some((from, to))
    }

    pub fn ensure_active(&self) -> Result<(), QueueError> {
        if self.state == QueueState::Stopped {
            Err(QueueError::Stopped)
        } else {
            Ok(())
        }
    }

    pub fn segment_at(&self, index: usize) -> Option<&AudioSegment> {
        self.order.get(index).and_then(|id| self.segments.get(id))
    }

    pub fn current(&self) -> Result<&AudioSegment, QueueError> {
        if self.current_index < 0 || self.current_index as usize >= self.order.len() {
            return Err(QueueError::NoCurrentSegment);
        }
        let id = &self.order[self.current_index as usize];
        self.segments
            .get(id)
            .ok_or_else(|| QueueError::SegmentReclaimed(id.clone()))
    }

    /// 当前片段（导航前为任意片段）是否已有音频
    pub fn is_ready(&self) -> bool {
        if self.current_index >= 0 {
            self.current().map_or(false, |s| s.is_ready())
        } else {
            self.segments.values().any(|s| s.is_ready())
        }
    }

    /// 需要合成的片段 ID
    ///
    /// 当前片段（若缺音频）优先，其后是窗口 `[max(current + 1, 0), + lookahead)`。
    pub fn lookahead_candidates(&self, lookahead: usize) -> Vec<String> {
        let mut ids = Vec::new();

        if let Ok(current) = self.current() {
            if !current.is_ready() {
                ids.push(current.id.clone());
            }
        }

        let start = (self.current_index + 1).max(0) as usize;
        let end = start.saturating_add(lookahead).min(self.order.len());
        for id in self.order.get(start..end).unwrap_or_default() {
            if let Some(segment) = self.segments.get(id) {
                if !segment.is_ready() {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    /// 移动当前索引
    ///
    /// 目标片段已被回收时返回错误且不移动。
    pub fn move_to(&mut self, target: usize, mark_vacated_played: bool) -> Result<AudioSegment, QueueError> {
        let target_id = self
            .order
            .get(target)
            .cloned()
            .ok_or(QueueError::NoCurrentSegment)?;
        if !self.segments.contains_key(&target_id) {
            return Err(QueueError::SegmentReclaimed(target_id));
        }

        if self.current_index >= 0 {
            let vacated = &self.order[self.current_index as usize];
            if let Some(segment) = self.segments.get_mut(vacated) {
                segment.playing = false;
                if mark_vacated_played {
                    segment.played = true;
                }
            }
        }

        self.current_index = target as isize;
        let segment = self
            .segments
            .get_mut(&target_id)
            .ok_or_else(|| QueueError::SegmentReclaimed(target_id.clone()))?;
        segment.playing = true;
        segment.last_accessed = Utc::now();
        Ok(segment.clone())
    }

    pub fn next(&mut self) -> Result<(AudioSegment, Transition), QueueError> {
        self.ensure_active()?;
        let target = self.current_index + 1;
        if target as usize >= self.order.len() {
            return Err(QueueError::EndOfQueue);
        }
        let segment = self.move_to(target as usize, true)?;
        Ok((segment, self.forward_transition()))
    }

    pub fn previous(&mut self) -> Result<AudioSegment, QueueError> {
        self.ensure_active()?;
        if self.current_index <= 0 {
            return Err(QueueError::BeginningOfQueue);
        }
        self.move_to((self.current_index - 1) as usize, false)
    }

    pub fn skip(&mut self, n: isize) -> Result<(AudioSegment, Transition), QueueError> {
        self.ensure_active()?;
        if self.order.is_empty() {
            return Err(QueueError::NoCurrentSegment);
        }

        let last = self.order.len() as isize - 1;
        let target = self.current_index.saturating_add(n).clamp(0, last);
        if target == self.current_index {
            return Ok((self.current()?.clone(), None));
        }

        let segment = self.move_to(target as usize, n > 0)?;
        let transition = if n > 0 {
            self.forward_transition()
        } else {
            None
        };
        Ok((segment, transition))
    }

    fn forward_transition(&mut self) -> Transition {
        match self.state {
            QueueState::Idle | QueueState::Processing => self.set_state(QueueState::Playing),
            _ => None,
        }
    }

    pub fn pause(&mut self) -> Result<Transition, QueueError> {
        self.ensure_active()?;
        match self.state {
            QueueState::Processing | QueueState::Playing => {
                self.paused_from = Some(self.state);
                Ok(self.set_state(QueueState::Paused))
            }
            _ => Ok(None),
        }
    }

    pub fn resume(&mut self) -> Result<Transition, QueueError> {
        self.ensure_active()?;
        if self.state != QueueState::Paused {
            return Ok(None);
        }
        let to = self.paused_from.take().unwrap_or(QueueState::Playing);
        Ok(self.set_state(to))
    }

    /// 清空所有片段，返回被移除的片段供对象池回收
    pub fn reset(&mut self) -> (Vec<AudioSegment>, Transition) {
        self.generation += 1;
        self.order.clear();
        self.current_index = -1;
        self.paused_from = None;
        let segments = self.segments.drain().map(|(_, s)| s).collect();

        let transition = if self.state == QueueState::Stopped {
            None
        } else {
            self.set_state(QueueState::Idle)
        };
        (segments, transition)
    }

    pub fn held_bytes(&self) -> u64 {
        self.segments.values().map(AudioSegment::held_bytes).sum()
    }
}
