//! Cache Metrics - 缓存访问计数

use std::sync::atomic::{AtomicU64, Ordering};

use crate::application::ports::{CacheMetricsSnapshot, MetricCounter};

/// 缓存计数器，全部为原子操作
#[derive(Debug, Default)]
pub struct CacheMetrics {
    total_accesses: AtomicU64,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    promotions: AtomicU64,
    cleanups: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, counter: MetricCounter) -> &AtomicU64 {
        match counter {
            MetricCounter::TotalAccesses => &self.total_accesses,
            MetricCounter::L1Hits => &self.l1_hits,
            MetricCounter::L2Hits => &self.l2_hits,
            MetricCounter::Misses => &self.misses,
            MetricCounter::Writes => &self.writes,
            MetricCounter::Promotions => &self.promotions,
            MetricCounter::Cleanups => &self.cleanups,
        }
    }

    fn incr(&self, counter: MetricCounter) {
        self.counter(counter).fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_l1_hit(&self) {
        self.incr(MetricCounter::TotalAccesses);
        self.incr(MetricCounter::L1Hits);
    }

    pub fn record_l2_hit(&self) {
        self.incr(MetricCounter::TotalAccesses);
        self.incr(MetricCounter::L2Hits);
        self.incr(MetricCounter::Promotions);
    }

    pub fn record_miss(&self) {
        self.incr(MetricCounter::TotalAccesses);
        self.incr(MetricCounter::Misses);
    }

    pub fn record_write(&self) {
        self.incr(MetricCounter::Writes);
    }

    pub fn record_cleanup(&self) {
        self.incr(MetricCounter::Cleanups);
    }

    pub fn get(&self, counter: MetricCounter) -> u64 {
        self.counter(counter).load(Ordering::Relaxed)
    }

    pub fn reset(&self, counter: MetricCounter) {
        self.counter(counter).store(0, Ordering::Relaxed);
    }

    pub fn reset_all(&self) {
        for counter in [
            MetricCounter::TotalAccesses,
            MetricCounter::L1Hits,
            MetricCounter::L2Hits,
            MetricCounter::Misses,
            MetricCounter::Writes,
            MetricCounter::Promotions,
            MetricCounter::Cleanups,
        ] {
            self.reset(counter);
        }
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        let total_accesses = self.get(MetricCounter::TotalAccesses);
        let l1_hits = self.get(MetricCounter::L1Hits);
        let l2_hits = self.get(MetricCounter::L2Hits);
        let hit_rate = if total_accesses == 0 {
            0.0
        } else {
            (l1_hits + l2_hits) as f64 / total_accesses as f64
        };

        CacheMetricsSnapshot {
            total_accesses,
            l1_hits,
            l2_hits,
            misses: self.get(MetricCounter::Misses),
            writes: self.get(MetricCounter::Writes),
            promotions: self.get(MetricCounter::Promotions),
            cleanups: self.get(MetricCounter::Cleanups),
            hit_rate,
        }
    }
}
