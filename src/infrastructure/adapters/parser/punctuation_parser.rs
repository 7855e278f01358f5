//! 基于标点的分句器
//!
//! 实现 SentenceParserPort，底层使用 domain 的文本分割器

use crate::application::ports::{ParseError, Sentence, SentenceParserPort};
use crate::domain::{segment_text, SegmentConfig};

/// 按句末标点分句，长句在逗号等弱分隔符处再切分
#[derive(Debug, Clone, Default)]
pub struct PunctuationSentenceParser {
    config: SegmentConfig,
}

impl PunctuationSentenceParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SegmentConfig) -> Self {
        Self { config }
    }
}

impl SentenceParserPort for PunctuationSentenceParser {
    fn parse_sentences(&self, text: &str) -> Result<Vec<Sentence>, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let sentences: Vec<Sentence> = segment_text(text, &self.config)
            .into_iter()
            .enumerate()
            .map(|(position, split)| Sentence {
                text: split.text,
                position,
                original: split.original,
            })
            .collect();

        tracing::trace!(sentences = sentences.len(), "Text parsed");
        Ok(sentences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sentences() {
        let parser = PunctuationSentenceParser::new();
        let sentences = parser.parse_sentences("First. Second.  Third!").unwrap();

        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["First.", "Second.", "Third!"]);
        assert_eq!(sentences[2].position, 2);
    }

    #[test]
    fn test_empty_input() {
        let parser = PunctuationSentenceParser::new();
        assert!(matches!(parser.parse_sentences("   "), Err(ParseError::EmptyInput)));
    }

    #[test]
    fn test_min_chars_merges_short_sentences() {
        let parser = PunctuationSentenceParser::with_config(SegmentConfig {
            min_chars: 10,
            ..Default::default()
        });
        let sentences = parser.parse_sentences("Hi. Yo. This one is long enough.").unwrap();
        assert_eq!(sentences.len(), 1);
    }
}
