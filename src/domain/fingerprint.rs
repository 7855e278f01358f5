//! Fingerprint - 合成请求的内容指纹
//!
//! 缓存 key: `"v1_" + hex(sha256(normalize(text) | normalize(voice) | speed:.2))`
//! 速度按两位小数格式化，四舍五入后相等的速度会得到同一个 key。

use sha2::{Digest, Sha256};

/// 指纹版本前缀
pub const FINGERPRINT_VERSION: &str = "v1_";

/// 规范化文本：去除首尾空白，合并连续空白，转小写
fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 生成缓存指纹
pub fn fingerprint(text: &str, voice: &str, speed: f32) -> String {
    let payload = format!("{}|{}|{:.2}", normalize(text), normalize(voice), speed);
    let digest = Sha256::digest(payload.as_bytes());
    format!("{}{:x}", FINGERPRINT_VERSION, digest)
}
