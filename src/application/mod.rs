//! Application Layer - 应用层
//!
//! - ports: 出站端口（TtsEnginePort, SentenceParserPort, AudioCachePort）
//! - error: 队列错误类型

pub mod error;
pub mod ports;

pub use error::QueueError;
