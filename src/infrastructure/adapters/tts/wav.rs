//! WAV 解包
//!
//! HTTP 引擎返回 WAV 容器，队列只处理 16-bit 单声道 PCM。

use crate::application::ports::TtsError;

/// WAV 头的关键字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

fn invalid(message: &str) -> TtsError {
    TtsError::InvalidResponse(format!("Invalid WAV: {}", message))
}

fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([data[pos], data[pos + 1]])
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

/// 解析 WAV 容器，返回格式和 data chunk 的字节范围
fn parse_wav(data: &[u8]) -> Result<(WavFormat, std::ops::Range<usize>), TtsError> {
    if data.len() < 44 {
        return Err(invalid("data too short"));
    }
    if &data[0..4] != b"RIFF" {
        return Err(invalid("missing RIFF header"));
    }
    if &data[8..12] != b"WAVE" {
        return Err(invalid("missing WAVE identifier"));
    }

    let mut pos = 12;
    let mut format: Option<WavFormat> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32(data, pos + 4) as usize;
        let body = pos + 8;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 || body + 16 > data.len() {
                    return Err(invalid("fmt chunk too short"));
                }
                format = Some(WavFormat {
                    audio_format: read_u16(data, body),
                    num_channels: read_u16(data, body + 2),
                    sample_rate: read_u32(data, body + 4),
                    bits_per_sample: read_u16(data, body + 14),
                });
            }
            b"data" => {
                let format = format.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
                // 流式 WAV 的 data 大小可能不准，截断到实际长度
                let end = body.saturating_add(chunk_size).min(data.len());
                return Ok((format, body..end));
            }
            _ => {}
        }

        // chunk 按 2 字节对齐
        pos = body + chunk_size + (chunk_size & 1);
    }

    Err(invalid("missing data chunk"))
}

/// 提取 16-bit PCM，立体声按左右声道平均混为单声道
pub fn extract_pcm(data: &[u8]) -> Result<(Vec<u8>, u32), TtsError> {
    let (format, range) = parse_wav(data)?;

    if format.audio_format != 1 {
        return Err(invalid(&format!("unsupported format {}", format.audio_format)));
    }
    if format.bits_per_sample != 16 {
        return Err(invalid(&format!(
            "unsupported bit depth {}",
            format.bits_per_sample
        )));
    }

    let samples = &data[range];
    let pcm = match format.num_channels {
        1 => samples[..samples.len() & !1].to_vec(),
        2 => samples
            .chunks_exact(4)
            .flat_map(|frame| {
                let left = i16::from_le_bytes([frame[0], frame[1]]) as i32;
                let right = i16::from_le_bytes([frame[2], frame[3]]) as i32;
                (((left + right) / 2) as i16).to_le_bytes()
            })
            .collect(),
        n => return Err(invalid(&format!("unsupported channel count {}", n))),
    };

    Ok((pcm, format.sample_rate))
}

#[cfg(test)]
pub(crate) fn build_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2 * channels as u32).to_le_bytes());
    wav.extend_from_slice(&(2 * channels).to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}
