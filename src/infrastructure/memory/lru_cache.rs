//! In-Memory LRU + TTL Audio Cache (L1)

use lru::LruCache;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::application::ports::{AudioData, CacheError};

/// 每个条目的固定开销
const ENTRY_OVERHEAD: u64 = 256;

/// 条目大小 = 音频 + 文本 + 固定开销
pub fn entry_size(data: &AudioData) -> u64 {
    data.audio.len() as u64 + data.text.len() as u64 + ENTRY_OVERHEAD
}

struct MemEntry {
    data: AudioData,
    size: u64,
    inserted_at: Instant,
    /// 条目自己的存活时间，从 L2 提升的条目可能短于 L1 TTL
    ttl: Duration,
}

impl MemEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

/// LRU 顺序由 LruCache 维护，容量按字节另行计算
struct LruState {
    entries: LruCache<String, MemEntry>,
    total_size: u64,
}

impl LruState {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_size: 0,
        }
    }

    fn remove(&mut self, key: &str) -> Option<MemEntry> {
        let entry = self.entries.pop(key)?;
        self.total_size -= entry.size;
        Some(entry)
    }
}

/// 内存 LRU 缓存
///
/// 独立的锁，磁盘写入不会阻塞内存缓存的访问。
pub struct MemoryCache {
    state: Mutex<LruState>,
    size_limit: u64,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(size_limit: u64, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(LruState::new()),
            size_limit,
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 读取条目，过期条目视为未命中并被移除
    pub fn get(&self, key: &str) -> Option<AudioData> {
        let mut state = self.lock();

        // get_mut 同时把条目提到 MRU
        let expired = match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.data.hits += 1;
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.remove(key);
            tracing::debug!(cache_key = %key, "L1 entry expired on access");
        }
        None
    }

    /// 写入条目，超出容量时从 LRU 尾部淘汰
    pub fn put(&self, key: &str, data: AudioData) -> Result<(), CacheError> {
        self.put_with_ttl(key, data, self.ttl)
    }

    /// 写入条目，存活时间取 `max_ttl` 与 L1 TTL 中较短者
    pub fn put_with_ttl(
        &self,
        key: &str,
        data: AudioData,
        max_ttl: Duration,
    ) -> Result<(), CacheError> {
        let size = entry_size(&data);
        if size > self.size_limit {
            return Err(CacheError::EntryTooLarge {
                size,
                limit: self.size_limit,
            });
        }

        let mut state = self.lock();
        state.remove(key);
        state.entries.put(
            key.to_string(),
            MemEntry {
                data,
                size,
                inserted_at: Instant::now(),
                ttl: max_ttl.min(self.ttl),
            },
        );
        state.total_size += size;

        while state.total_size > self.size_limit {
            match state.entries.pop_lru() {
                Some((evicted, entry)) => {
                    state.total_size -= entry.size;
                    tracing::debug!(
                        cache_key = %evicted,
                        size_bytes = entry.size,
                        "L1 evicted LRU entry"
                    );
                }
                None => break,
            }
        }

        Ok(())
    }

    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.total_size = 0;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size(&self) -> u64 {
        self.lock().total_size
    }

    /// 从 LRU 尾部开始清除所有过期条目，返回清除数量
    pub fn cleanup(&self) -> usize {
        let mut state = self.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .rev()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(key: &str, audio_len: usize) -> AudioData {
        AudioData::new(key, vec![7u8; audio_len], "", "fake", 1.0)
    }

    #[test]
    fn test_put_get_returns_copy() {
        let cache = MemoryCache::new(10_000, Duration::from_secs(60));
        cache.put("a", data("a", 10)).unwrap();

        let mut first = cache.get("a").unwrap();
        first.audio[0] = 0;
        let second = cache.get("a").unwrap();
        assert_eq!(second.audio[0], 7);
        assert_eq!(second.hits, 2);
    }

    #[test]
    fn test_lru_eviction() {
        // 每个条目 100 + 256 = 356 字节，容量可放 2 个
        let cache = MemoryCache::new(800, Duration::from_secs(60));
        cache.put("a", data("a", 100)).unwrap();
        cache.put("b", data("b", 100)).unwrap();

        // 访问 a，使 b 成为 LRU
        assert!(cache.get("a").is_some());

        cache.put("c", data("c", 100)).unwrap();
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.size() <= 800);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let cache = MemoryCache::new(300, Duration::from_secs(60));
        let result = cache.put("big", data("big", 100));
        assert!(matches!(result, Err(CacheError::EntryTooLarge { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replace_updates_size() {
        let cache = MemoryCache::new(10_000, Duration::from_secs(60));
        cache.put("a", data("a", 100)).unwrap();
        cache.put("a", data("a", 10)).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size(), 10 + 256);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = MemoryCache::new(10_000, Duration::from_millis(50));
        cache.put("a", data("a", 10)).unwrap();
        assert!(cache.get("a").is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert!(cache.get("a").is_none());
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_cleanup_purges_expired() {
        let cache = MemoryCache::new(10_000, Duration::from_millis(50));
        cache.put("a", data("a", 10)).unwrap();
        cache.put("b", data("b", 10)).unwrap();

        std::thread::sleep(Duration::from_millis(80));
        cache.put("c", data("c", 10)).unwrap();

        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_put_with_ttl_uses_shorter_lifetime() {
        let cache = MemoryCache::new(10_000, Duration::from_secs(60));
        cache
            .put_with_ttl("short", data("short", 10), Duration::from_millis(50))
            .unwrap();
        cache
            .put_with_ttl("long", data("long", 10), Duration::from_secs(3600))
            .unwrap();

        std::thread::sleep(Duration::from_millis(80));
        assert!(cache.get("short").is_none());
        assert!(cache.get("long").is_some());
    }
}
