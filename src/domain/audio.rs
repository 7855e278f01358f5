//! PCM Audio Preprocessing
//!
//! 纯函数，输入输出均为 16-bit signed mono little-endian PCM。
//! 奇数长度缓冲的最后一个字节不构成完整采样，按原样保留或忽略。

use std::time::Duration;

/// 静音判定阈值（归一化幅度）
pub const SILENCE_THRESHOLD: f32 = 0.01;

/// 归一化目标峰值（满幅的比例）
pub const NORMALIZE_TARGET: f32 = 0.8;

/// 归一化的最大增益
pub const MAX_GAIN: f32 = 2.0;

const FULL_SCALE: f32 = 32768.0;

#[inline]
fn sample_at(audio: &[u8], index: usize) -> i16 {
    i16::from_le_bytes([audio[index * 2], audio[index * 2 + 1]])
}

#[inline]
fn to_i16(value: f32) -> i16 {
    value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// 裁掉首尾静音
///
/// 从两端寻找第一个幅度超过阈值的采样。整段都低于阈值时原样返回，不会返回空切片。
pub fn trim_silence(audio: &[u8]) -> &[u8] {
    let sample_count = audio.len() / 2;
    let is_loud = |i: usize| (sample_at(audio, i) as f32).abs() / FULL_SCALE > SILENCE_THRESHOLD;

    let start = match (0..sample_count).find(|&i| is_loud(i)) {
        Some(i) => i,
        None => return audio,
    };
    // start 存在时 end 一定存在
    let end = (start..sample_count).rev().find(|&i| is_loud(i)).unwrap_or(start);

    &audio[start * 2..(end + 1) * 2]
}

/// 音量归一化
///
/// 增益为 `min(2.0, 0.8 * 32768 / peak)`，峰值为 0 时原样返回。
pub fn normalize_audio(audio: &[u8]) -> Vec<u8> {
    let sample_count = audio.len() / 2;
    let peak = (0..sample_count)
        .map(|i| (sample_at(audio, i) as i32).abs())
        .max()
        .unwrap_or(0);

    if peak == 0 {
        return audio.to_vec();
    }

    let gain = (NORMALIZE_TARGET * FULL_SCALE / peak as f32).min(MAX_GAIN);
    let mut out = Vec::with_capacity(audio.len());
    for i in 0..sample_count {
        let scaled = to_i16(sample_at(audio, i) as f32 * gain);
        out.extend_from_slice(&scaled.to_le_bytes());
    }
    if audio.len() % 2 != 0 {
        out.push(audio[audio.len() - 1]);
    }
    out
}

/// 两段音频线性交叉淡化
///
/// `a` 末尾的 overlap 与 `b` 开头的 overlap 混合，结果长度为 `len(a) + len(b) - overlap`。
/// 任一输入为空时返回另一段；overlap 超过任一输入长度时直接拼接。
pub fn crossfade(a: &[u8], b: &[u8], overlap_ms: u32, sample_rate: u32) -> Vec<u8> {
    if a.is_empty() {
        return b.to_vec();
    }
    if b.is_empty() {
        return a.to_vec();
    }

    let overlap_samples = (overlap_ms as u64 * sample_rate as u64 / 1000) as usize;
    let overlap_bytes = overlap_samples * 2;

    if overlap_bytes == 0 || overlap_bytes > a.len() || overlap_bytes > b.len() {
        let mut out = Vec::with_capacity(a.len() + b.len());
        out.extend_from_slice(a);
        out.extend_from_slice(b);
        return out;
    }

    let head = a.len() - overlap_bytes;
    let mut out = Vec::with_capacity(a.len() + b.len() - overlap_bytes);
    out.extend_from_slice(&a[..head]);

    let tail = &a[head..];
    for i in 0..overlap_samples {
        let t = i as f32 / overlap_samples as f32;
        let mixed = sample_at(tail, i) as f32 * (1.0 - t) + sample_at(b, i) as f32 * t;
        out.extend_from_slice(&to_i16(mixed).to_le_bytes());
    }

    out.extend_from_slice(&b[overlap_bytes..]);
    out
}

/// 两段音频逐采样叠加（饱和），长度取较长者
pub fn mix_audio(a: &[u8], b: &[u8]) -> Vec<u8> {
    let a_samples = a.len() / 2;
    let b_samples = b.len() / 2;
    let total = a_samples.max(b_samples);

    let mut out = Vec::with_capacity(total * 2);
    for i in 0..total {
        let sa = if i < a_samples { sample_at(a, i) } else { 0 };
        let sb = if i < b_samples { sample_at(b, i) } else { 0 };
        out.extend_from_slice(&sa.saturating_add(sb).to_le_bytes());
    }
    out
}

/// 根据字节数和采样率计算时长
pub fn pcm_duration(byte_len: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64((byte_len / 2) as f64 / sample_rate as f64)
}

/// 合成后处理流水线：先裁静音，再归一化
#[derive(Debug, Clone, Copy)]
pub struct AudioPreprocessor {
    pub trim_silence: bool,
    pub normalize: bool,
}

impl Default for AudioPreprocessor {
    fn default() -> Self {
        Self {
            trim_silence: true,
            normalize: true,
        }
    }
}

impl AudioPreprocessor {
    pub fn new(trim_silence: bool, normalize: bool) -> Self {
        Self {
            trim_silence,
            normalize,
        }
    }

    pub fn process(&self, raw: &[u8]) -> Vec<u8> {
        let trimmed = if self.trim_silence {
            trim_silence(raw)
        } else {
            raw
        };

        if self.normalize {
            normalize_audio(trimmed)
        } else {
            trimmed.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn samples(audio: &[u8]) -> Vec<i16> {
        (0..audio.len() / 2).map(|i| sample_at(audio, i)).collect()
    }

    #[test]
    fn test_trim_silence_removes_quiet_edges() {
        let audio = pcm(&[0, 10, 5000, -6000, 20, 0]);
        assert_eq!(samples(trim_silence(&audio)), vec![5000, -6000]);
    }

    #[test]
    fn test_trim_silence_keeps_all_quiet_buffer() {
        let audio = pcm(&[0, 10, -20, 0]);
        assert_eq!(trim_silence(&audio), audio.as_slice());
        assert!(trim_silence(&[]).is_empty());
    }

    #[test]
    fn test_normalize_scales_to_target_peak() {
        let audio = pcm(&[16384, -8192]);
        let out = samples(&normalize_audio(&audio));
        // 0.8 * 32768 / 16384 = 1.6
        assert_eq!(out, vec![26214, -13107]);
    }

    #[test]
    fn test_normalize_caps_gain() {
        let audio = pcm(&[1000, -500]);
        assert_eq!(samples(&normalize_audio(&audio)), vec![2000, -1000]);
    }

    #[test]
    fn test_normalize_silence_unchanged() {
        let audio = pcm(&[0, 0, 0]);
        assert_eq!(normalize_audio(&audio), audio);
    }

    #[test]
    fn test_crossfade_empty_inputs() {
        let b = pcm(&[1, 2, 3]);
        assert_eq!(crossfade(&[], &b, 10, 8000), b);
        assert_eq!(crossfade(&b, &[], 10, 8000), b);
    }

    #[test]
    fn test_crossfade_length() {
        // 1000 Hz, 2ms overlap = 2 samples = 4 bytes
        let a = pcm(&[100; 10]);
        let b = pcm(&[-100; 8]);
        let out = crossfade(&a, &b, 2, 1000);
        assert_eq!(out.len(), a.len() + b.len() - 4);

        let s = samples(&out);
        assert_eq!(s[7], 100);
        // t = 0 -> a; t = 0.5 -> midpoint
        assert_eq!(s[8], 100);
        assert_eq!(s[9], 0);
        assert_eq!(s[10], -100);
    }

    #[test]
    fn test_crossfade_overlap_too_large_concatenates() {
        let a = pcm(&[1, 2]);
        let b = pcm(&[3, 4, 5]);
        let out = crossfade(&a, &b, 1000, 8000);
        assert_eq!(samples(&out), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_mix_audio_saturates() {
        let a = pcm(&[30000, 1]);
        let b = pcm(&[10000, 2, 7]);
        assert_eq!(samples(&mix_audio(&a, &b)), vec![i16::MAX, 3, 7]);
    }

    #[test]
    fn test_pcm_duration() {
        assert_eq!(pcm_duration(44100, 22050), Duration::from_secs(1));
        assert_eq!(pcm_duration(100, 0), Duration::ZERO);
    }

    #[test]
    fn test_preprocessor_pipeline() {
        let audio = pcm(&[0, 8192, 0]);
        let out = AudioPreprocessor::default().process(&audio);
        // 0.8 * 32768 / 8192 = 3.2 -> capped at 2.0
        assert_eq!(samples(&out), vec![16384]);

        let passthrough = AudioPreprocessor::new(false, false).process(&audio);
        assert_eq!(passthrough, audio);
    }
}
