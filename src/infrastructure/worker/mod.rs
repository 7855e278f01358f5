//! Worker Layer - Background Synthesis
//!
//! 从合成队列消费片段 ID，执行缓存查找、TTS 合成和音频预处理

mod synth_worker;

pub use synth_worker::CANONICAL_SPEED;
pub(crate) use synth_worker::run_worker;
