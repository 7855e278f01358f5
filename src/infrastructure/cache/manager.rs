//! Two-Level Cache Manager
//!
//! L1 内存 LRU + L2 磁盘缓存:
//! - get: L1 命中直接返回；L2 命中时提升到 L1
//! - put: 写穿，L1 失败仅记录日志，L2 必须成功
//! - 后台任务定期清理两级缓存中的过期条目

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::metrics::CacheMetrics;
use crate::application::ports::{
    AudioCachePort, AudioData, CacheError, CacheMetricsSnapshot, MetricCounter,
};
use crate::infrastructure::memory::MemoryCache;
use crate::infrastructure::persistence::{DiskCache, DiskCacheConfig};

/// 缓存管理器配置
#[derive(Debug, Clone)]
pub struct CacheManagerConfig {
    pub l1_size_limit: u64,
    pub l1_ttl: Duration,
    pub disk: DiskCacheConfig,
    pub cleanup_interval: Duration,
}

/// 两级缓存管理器
pub struct CacheManager {
    l1: Arc<MemoryCache>,
    l2: Arc<DiskCache>,
    metrics: Arc<CacheMetrics>,
    shutdown: CancellationToken,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl CacheManager {
    /// 打开两级缓存并启动后台清理任务
    pub async fn open(config: CacheManagerConfig) -> Result<Arc<Self>, CacheError> {
        let l1 = Arc::new(MemoryCache::new(config.l1_size_limit, config.l1_ttl));
        let l2 = Arc::new(DiskCache::open(&config.disk).await?);
        let metrics = Arc::new(CacheMetrics::new());
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(cleanup_loop(
            l1.clone(),
            l2.clone(),
            metrics.clone(),
            config.cleanup_interval,
            shutdown.clone(),
        ));

        tracing::info!(
            l1_size_limit = config.l1_size_limit,
            l1_ttl_secs = config.l1_ttl.as_secs(),
            cleanup_interval_secs = config.cleanup_interval.as_secs(),
            "CacheManager started"
        );

        Ok(Arc::new(Self {
            l1,
            l2,
            metrics,
            shutdown,
            cleanup_task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        }))
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    /// 立即执行一次清理
    pub async fn run_cleanup(&self) {
        cleanup_pass(&self.l1, &self.l2, &self.metrics).await;
    }

    pub fn reset_metric(&self, counter: MetricCounter) {
        self.metrics.reset(counter);
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset_all();
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.l1
    }

    pub fn disk(&self) -> &DiskCache {
        &self.l2
    }
}

async fn cleanup_pass(l1: &MemoryCache, l2: &DiskCache, metrics: &CacheMetrics) {
    let purged = l1.cleanup();
    match l2.cleanup().await {
        Ok(result) => {
            tracing::debug!(
                l1_purged = purged,
                l2_expired = result.expired,
                l2_evicted = result.evicted,
                "Cache cleanup finished"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Disk cache cleanup failed");
        }
    }
    metrics.record_cleanup();
}

async fn cleanup_loop(
    l1: Arc<MemoryCache>,
    l2: Arc<DiskCache>,
    metrics: Arc<CacheMetrics>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // 第一次 tick 立即返回，跳过
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => cleanup_pass(&l1, &l2, &metrics).await,
        }
    }

    tracing::debug!("Cache cleanup task stopped");
}

#[async_trait]
impl AudioCachePort for CacheManager {
    async fn get(&self, cache_key: &str) -> Result<AudioData, CacheError> {
        self.ensure_open()?;

        if let Some(data) = self.l1.get(cache_key) {
            self.metrics.record_l1_hit();
            return Ok(data);
        }

        match self.l2.get(cache_key).await {
            Ok(Some(data)) => {
                // 提升的条目不能比 L2 中的原条目活得更久
                let remaining = self.l2.remaining_ttl(&data);
                if let Err(e) = self.l1.put_with_ttl(cache_key, data.clone(), remaining) {
                    tracing::debug!(cache_key = %cache_key, error = %e, "L1 promotion skipped");
                }
                self.metrics.record_l2_hit();
                Ok(data)
            }
            Ok(None) => {
                self.metrics.record_miss();
                Err(CacheError::Miss)
            }
            Err(e) => {
                tracing::warn!(cache_key = %cache_key, error = %e, "L2 read failed, treating as miss");
                self.metrics.record_miss();
                Err(CacheError::Miss)
            }
        }
    }

    async fn put(&self, cache_key: &str, data: AudioData) -> Result<(), CacheError> {
        self.ensure_open()?;

        if let Err(e) = self.l1.put(cache_key, data.clone()) {
            tracing::debug!(cache_key = %cache_key, error = %e, "L1 write skipped");
        }
        self.l2.put(cache_key, &data).await?;
        self.metrics.record_write();
        Ok(())
    }

    async fn delete(&self, cache_key: &str) -> Result<(), CacheError> {
        self.l1.delete(cache_key);
        self.l2.delete(cache_key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.l1.clear();
        let mut errors = Vec::new();
        if let Err(e) = self.l2.clear().await {
            errors.push(format!("l2: {}", e));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Aggregate(errors))
        }
    }

    fn size(&self) -> u64 {
        self.l1.size() + self.l2.size()
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn close(&self) -> Result<(), CacheError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.shutdown.cancel();
        let task = self
            .cleanup_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Cache cleanup task join failed");
            }
        }

        self.l1.clear();
        self.l2.close().await?;

        tracing::info!("CacheManager closed");
        Ok(())
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path) -> CacheManagerConfig {
        CacheManagerConfig {
            l1_size_limit: 1024 * 1024,
            l1_ttl: Duration::from_secs(3600),
            disk: DiskCacheConfig {
                dir: dir.join("cache"),
                size_limit: 10 * 1024 * 1024,
                ttl: Duration::from_secs(3600),
            },
            cleanup_interval: Duration::from_secs(300),
        }
    }

    fn data(key: &str) -> AudioData {
        AudioData::new(key, vec![1, 2, 3, 4], "Hello.", "fake", 1.0)
    }

    #[tokio::test]
    async fn test_put_then_get_is_l1_hit() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::open(config(dir.path())).await.unwrap();

        cache.put("k", data("k")).await.unwrap();
        let result = cache.get("k").await.unwrap();
        assert_eq!(result.audio, vec![1, 2, 3, 4]);

        let metrics = cache.metrics();
        assert_eq!(metrics.l1_hits, 1);
        assert_eq!(metrics.l2_hits, 0);
        assert_eq!(metrics.writes, 1);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_l2_hit_promotes_to_l1() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::open(config(dir.path())).await.unwrap();

        cache.put("k", data("k")).await.unwrap();
        cache.memory().clear();

        cache.get("k").await.unwrap();
        let metrics = cache.metrics();
        assert_eq!(metrics.l2_hits, 1);
        assert_eq!(metrics.promotions, 1);
        assert!(cache.memory().contains("k"));

        cache.get("k").await.unwrap();
        assert_eq!(cache.metrics().l1_hits, 1);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_miss() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::open(config(dir.path())).await.unwrap();

        let result = cache.get("nope").await;
        assert!(matches!(result, Err(CacheError::Miss)));
        assert_eq!(result.unwrap_err().to_string(), "cache miss");

        let metrics = cache.metrics();
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hit_rate, 0.0);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_ttl_expiry_on_both_levels() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.l1_ttl = Duration::from_millis(50);
        cfg.disk.ttl = Duration::from_millis(50);
        let cache = CacheManager::open(cfg).await.unwrap();

        cache.put("k", data("k")).await.unwrap();
        assert!(cache.get("k").await.is_ok());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(cache.get("k").await, Err(CacheError::Miss)));

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_clear_and_size() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::open(config(dir.path())).await.unwrap();

        cache.put("a", data("a")).await.unwrap();
        cache.put("b", data("b")).await.unwrap();
        // L1: 2 * (4 + 6 + 256), L2: 2 * 4
        assert_eq!(cache.size(), 2 * 266 + 8);

        cache.delete("a").await.unwrap();
        assert!(cache.get("a").await.is_err());

        cache.clear().await.unwrap();
        assert_eq!(cache.size(), 0);
        assert!(cache.get("b").await.is_err());

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_access() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::open(config(dir.path())).await.unwrap();

        cache.close().await.unwrap();
        cache.close().await.unwrap();
        assert!(matches!(cache.put("k", data("k")).await, Err(CacheError::Closed)));
    }

    #[tokio::test]
    async fn test_run_cleanup_counts() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::open(config(dir.path())).await.unwrap();

        cache.run_cleanup().await;
        assert_eq!(cache.metrics().cleanups, 1);

        cache.reset_metric(MetricCounter::Cleanups);
        assert_eq!(cache.metrics().cleanups, 0);

        cache.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_promoted_entry_keeps_l2_deadline() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.disk.ttl = Duration::from_millis(150);
        let cache = CacheManager::open(cfg).await.unwrap();

        cache.put("k", data("k")).await.unwrap();
        cache.memory().clear();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // L2 剩余约 50ms，提升后 L1 不应再多保留一个完整的 L1 TTL
        cache.get("k").await.unwrap();
        assert!(cache.memory().contains("k"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(cache.get("k").await, Err(CacheError::Miss)));

        cache.close().await.unwrap();
    }
}
