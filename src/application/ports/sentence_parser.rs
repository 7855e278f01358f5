//! Sentence Parser Port - 分句抽象
//!
//! 将一段文本拆成可朗读的句子，具体实现在 infrastructure/adapters 层

use thiserror::Error;

/// 分句错误
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty input")]
    EmptyInput,

    #[error("Parse failed: {0}")]
    Failed(String),
}

/// 分句结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// 朗读文本
    pub text: String,
    /// 在输入中的序号
    pub position: usize,
    /// 原始片段
    pub original: String,
}

/// Sentence Parser Port
pub trait SentenceParserPort: Send + Sync {
    fn parse_sentences(&self, text: &str) -> Result<Vec<Sentence>, ParseError>;
}
