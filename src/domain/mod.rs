//! Domain Layer - 领域层
//!
//! 与 I/O 无关的核心模型和纯函数:
//! - segment: TextSegment / AudioSegment / QueueState
//! - fingerprint: 合成请求的缓存指纹
//! - audio: PCM 预处理（裁静音、归一化、交叉淡化、混音）
//! - text_segmenter: 纯文本分句

pub mod audio;
pub mod fingerprint;
pub mod segment;

mod text_segmenter;

pub use audio::{
    crossfade, mix_audio, normalize_audio, pcm_duration, trim_silence, AudioPreprocessor,
};
pub use fingerprint::fingerprint;
pub use segment::{AudioSegment, QueueState, TextSegment};
pub use text_segmenter::{segment_text, segment_text_default, SegmentConfig, SplitSentence};
