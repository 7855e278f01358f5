//! AudioSegment Object Pool

use std::sync::Mutex;

use crate::domain::{AudioSegment, TextSegment};

/// 有界的 AudioSegment 空闲列表
///
/// 回收的片段会被清空音频后放回，超过容量的直接丢弃。
pub struct SegmentPool {
    free: Mutex<Vec<AudioSegment>>,
    capacity: usize,
}

impl SegmentPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AudioSegment>> {
        self.free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 取出一个片段并用文本填充，池为空时新建
    pub fn acquire(&self, segment: TextSegment) -> AudioSegment {
        match self.lock().pop() {
            Some(mut reused) => {
                reused.refill(segment);
                reused
            }
            None => AudioSegment::from_text(segment),
        }
    }

    /// 归还片段
    pub fn release(&self, mut segment: AudioSegment) {
        segment.reset();
        let mut free = self.lock();
        if free.len() < self.capacity {
            free.push(segment);
        }
    }

    /// 释放池中保留的所有对象
    pub fn shrink(&self) -> usize {
        let mut free = self.lock();
        let released = free.len();
        free.clear();
        free.shrink_to_fit();
        released
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_release_and_reuse() {
        let pool = SegmentPool::new(2);
        let mut segment = pool.acquire(TextSegment::new("One.", 0));
        segment.raw_audio = Some(Arc::new(vec![1, 2, 3]));
        pool.release(segment);
        assert_eq!(pool.len(), 1);

        let reused = pool.acquire(TextSegment::new("Two.", 1));
        assert_eq!(reused.text, "Two.");
        assert!(reused.raw_audio.is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_capacity_bound_and_shrink() {
        let pool = SegmentPool::new(1);
        pool.release(AudioSegment::from_text(TextSegment::new("a", 0)));
        pool.release(AudioSegment::from_text(TextSegment::new("b", 1)));
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.shrink(), 1);
        assert!(pool.is_empty());
    }
}
