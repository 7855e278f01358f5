//! Narrator - TTS 朗读音频流水线
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Segment: TextSegment / AudioSegment / QueueState
//! - Audio: PCM 预处理（静音裁剪、归一化、交叉淡化、混音）
//! - Fingerprint: 缓存指纹
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TtsEngine, SentenceParser, AudioCache）
//! - QueueError: 队列对外错误
//!
//! 基础设施层 (infrastructure/):
//! - Queue: AudioQueue（预读、导航、内存管理）
//! - Worker: 合成 worker 池
//! - Memory / Persistence / Cache: L1 内存 LRU + L2 磁盘缓存 + CacheManager
//! - Adapters: Fake/HTTP TTS 引擎，标点分句器
//! - Events: 状态、进度、错误事件

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::QueueError;
pub use config::{load_config, AppConfig};
pub use infrastructure::{AudioQueue, AudioQueueConfig, CacheManager, CacheManagerConfig};
