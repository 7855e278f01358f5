//! Application Ports - 出站端口定义
//!
//! 定义朗读队列与基础设施层之间的抽象接口

mod audio_cache;
mod sentence_parser;
mod tts_engine;

pub use audio_cache::{
    AudioCachePort, AudioData, CacheError, CacheMetricsSnapshot, MetricCounter,
};
pub use sentence_parser::{ParseError, Sentence, SentenceParserPort};
pub use tts_engine::{validate_speed, TtsEnginePort, TtsError, DEFAULT_SAMPLE_RATE};
