//! Disk-backed Audio Cache (L2)
//!
//! 目录布局:
//! - `index.json`: key -> CacheMetadata
//! - `<sha256(key)>.pcm`: 每个 key 一个音频文件
//!
//! 目录权限 0700，文件权限 0600（unix）。

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{AudioData, CacheError};

/// 索引文件名
pub const INDEX_FILE: &str = "index.json";

/// 超出容量时淘汰到该比例以下
const EVICTION_TARGET_RATIO: f64 = 0.9;

/// 磁盘缓存配置
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// 缓存目录
    pub dir: PathBuf,
    /// 最大缓存大小（字节）
    pub size_limit: u64,
    /// 条目存活时间
    pub ttl: Duration,
}

/// 持久化的缓存元数据（不含音频字节）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub text: String,
    pub voice: String,
    pub speed: f32,
    pub cache_key: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    pub hits: u64,
    pub audio_file: String,
}

/// 单次清理的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupResult {
    pub expired: usize,
    pub evicted: usize,
}

/// 磁盘音频缓存
pub struct DiskCache {
    dir: PathBuf,
    index: DashMap<String, CacheMetadata>,
    size_limit: u64,
    ttl: Duration,
    current_size: AtomicU64,
    /// get 更新了 hits 但尚未写回索引
    dirty: AtomicBool,
    persist_lock: tokio::sync::Mutex<()>,
}

/// key 对应的音频文件名，任意 key 都能安全地作为文件名
fn payload_file_name(key: &str) -> String {
    format!("{:x}.pcm", Sha256::digest(key.as_bytes()))
}

async fn create_private_dir(dir: &Path) -> Result<(), CacheError> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await?;
    Ok(())
}

async fn write_owner_only(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

impl DiskCache {
    /// 打开（或创建）缓存目录并加载索引
    pub async fn open(config: &DiskCacheConfig) -> Result<Self, CacheError> {
        create_private_dir(&config.dir).await?;

        let cache = Self {
            dir: config.dir.clone(),
            index: DashMap::new(),
            size_limit: config.size_limit,
            ttl: config.ttl,
            current_size: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            persist_lock: tokio::sync::Mutex::new(()),
        };
        cache.load_index().await?;

        tracing::info!(
            dir = %cache.dir.display(),
            entries = cache.index.len(),
            size_bytes = cache.size(),
            size_limit = cache.size_limit,
            "DiskCache opened"
        );

        Ok(cache)
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    async fn load_index(&self) -> Result<(), CacheError> {
        let bytes = match tokio::fs::read(self.index_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let entries: HashMap<String, CacheMetadata> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Corrupt cache index, starting empty");
                return Ok(());
            }
        };

        let mut dropped = 0usize;
        for (key, meta) in entries {
            let payload = self.dir.join(&meta.audio_file);
            if tokio::fs::try_exists(&payload).await.unwrap_or(false) {
                self.current_size.fetch_add(meta.size, Ordering::Relaxed);
                self.index.insert(key, meta);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            tracing::warn!(dropped, "Dropped index entries with missing payload files");
            self.dirty.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    /// 将索引写入磁盘（临时文件 + rename）
    pub async fn persist_index(&self) -> Result<(), CacheError> {
        let _guard = self.persist_lock.lock().await;

        let snapshot: BTreeMap<String, CacheMetadata> = self
            .index
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.dir.join(format!("{}.tmp", INDEX_FILE));
        write_owner_only(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, self.index_path()).await?;

        self.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// 条目在 L2 中剩余的存活时间
    pub fn remaining_ttl(&self, data: &AudioData) -> Duration {
        (Utc::now() - data.timestamp)
            .to_std()
            .map_or(self.ttl, |age| self.ttl.saturating_sub(age))
    }

    fn is_expired(&self, meta: &CacheMetadata) -> bool {
        (Utc::now() - meta.timestamp)
            .to_std()
            .map_or(false, |age| age > self.ttl)
    }

    /// 读取条目
    ///
    /// 过期条目返回 None，但不在这里删除，由 cleanup 统一处理。
    pub async fn get(&self, key: &str) -> Result<Option<AudioData>, CacheError> {
        let meta = match self.index.get(key) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };

        if self.is_expired(&meta) {
            tracing::debug!(cache_key = %key, "L2 entry expired");
            return Ok(None);
        }

        let audio = tokio::fs::read(self.dir.join(&meta.audio_file)).await?;

        if let Some(mut entry) = self.index.get_mut(key) {
            entry.hits += 1;
        }
        self.dirty.store(true, Ordering::Relaxed);

        Ok(Some(AudioData {
            audio,
            text: meta.text,
            voice: meta.voice,
            speed: meta.speed,
            cache_key: meta.cache_key,
            timestamp: meta.timestamp,
            size: meta.size,
            hits: meta.hits + 1,
        }))
    }

    /// 写入条目：先写音频文件，再更新并持久化索引
    pub async fn put(&self, key: &str, data: &AudioData) -> Result<(), CacheError> {
        let audio_file = payload_file_name(key);
        write_owner_only(&self.dir.join(&audio_file), &data.audio).await?;

        let size = data.audio.len() as u64;
        let meta = CacheMetadata {
            text: data.text.clone(),
            voice: data.voice.clone(),
            speed: data.speed,
            cache_key: key.to_string(),
            timestamp: Utc::now(),
            size,
            hits: 0,
            audio_file,
        };

        if let Some(old) = self.index.insert(key.to_string(), meta) {
            self.current_size.fetch_sub(old.size, Ordering::Relaxed);
        }
        self.current_size.fetch_add(size, Ordering::Relaxed);

        tracing::debug!(cache_key = %key, size_bytes = size, "Audio written to disk cache");
        self.persist_index().await
    }

    async fn remove_entry(&self, key: &str) -> Option<CacheMetadata> {
        let (_, meta) = self.index.remove(key)?;
        self.current_size.fetch_sub(meta.size, Ordering::Relaxed);

        if let Err(e) = tokio::fs::remove_file(self.dir.join(&meta.audio_file)).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(cache_key = %key, error = %e, "Failed to remove cache payload");
            }
        }
        Some(meta)
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if self.remove_entry(key).await.is_some() {
            self.persist_index().await?;
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        let keys: Vec<String> = self.index.iter().map(|e| e.key().clone()).collect();
        for key in &keys {
            self.remove_entry(key).await;
        }
        self.persist_index().await
    }

    /// 清理过期条目，超出容量时按时间戳淘汰最旧的条目直到 90% 以下
    pub async fn cleanup(&self) -> Result<CleanupResult, CacheError> {
        let mut result = CleanupResult::default();

        let expired: Vec<String> = self
            .index
            .iter()
            .filter(|e| self.is_expired(e.value()))
            .map(|e| e.key().clone())
            .collect();
        for key in &expired {
            if self.remove_entry(key).await.is_some() {
                result.expired += 1;
            }
        }

        if self.size() > self.size_limit {
            let target = (self.size_limit as f64 * EVICTION_TARGET_RATIO) as u64;
            while self.size() > target {
                // 每次线性扫描找最旧条目，条目数量不大时足够
                let oldest = self
                    .index
                    .iter()
                    .min_by_key(|e| e.value().timestamp)
                    .map(|e| e.key().clone());
                match oldest {
                    Some(key) => {
                        self.remove_entry(&key).await;
                        result.evicted += 1;
                    }
                    None => break,
                }
            }
        }

        if result.expired > 0 || result.evicted > 0 || self.dirty.load(Ordering::Relaxed) {
            self.persist_index().await?;
        }

        if result.expired > 0 || result.evicted > 0 {
            tracing::debug!(
                expired = result.expired,
                evicted = result.evicted,
                size_bytes = self.size(),
                "Disk cache cleanup"
            );
        }
        Ok(result)
    }

    /// 持久化索引
    pub async fn close(&self) -> Result<(), CacheError> {
        self.persist_index().await
    }

    pub fn size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn metadata(&self, key: &str) -> Option<CacheMetadata> {
        self.index.get(key).map(|e| e.value().clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
