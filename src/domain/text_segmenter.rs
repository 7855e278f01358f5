//! 文本分割器
//!
//! 将纯文本按句切分，供朗读队列逐句合成。

/// 默认最小字符数（0 表示不合并短句）
pub const DEFAULT_MIN_CHARS: usize = 0;

/// 默认的弱分隔符切分长度
pub const DEFAULT_WEAK_SPLIT_CHARS: usize = 200;

/// 文本分割配置
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 短句合并阈值，未达到时与后续句子合并
    pub min_chars: usize,
    /// 句子超过该字符数后，弱分隔符（逗号等）也会触发分割
    pub weak_split_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            weak_split_chars: DEFAULT_WEAK_SPLIT_CHARS,
        }
    }
}

/// 分割出的句子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSentence {
    /// 合并空白后的朗读文本
    pub text: String,
    /// 原始片段（仅去除首尾空白）
    pub original: String,
}

/// 强分隔符（句末标点，总是分割）
#[inline]
fn is_strong_delimiter(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！' | '.' | '?' | '!')
}

/// 弱分隔符（逗号等，句子足够长时才分割）
#[inline]
fn is_weak_delimiter(ch: char) -> bool {
    matches!(ch, '，' | '；' | '：' | ',' | ';' | ':')
}

/// 只有引号或空白的片段
#[inline]
fn is_trivial_segment(s: &str) -> bool {
    s.chars().all(|c| {
        matches!(
            c,
            '"' | '\u{201C}' | '\u{201D}' | '\'' | '\u{2018}' | '\u{2019}' | ' ' | '\t'
        )
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 按分隔符分割单行（不做合并）
///
/// 连续的句末标点（如 "?!" 或 "..."）保留在同一句中。
fn split_by_delimiters(line: &str, config: &SegmentConfig) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut char_count = 0;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        char_count += 1;

        let should_split = if is_strong_delimiter(ch) {
            !chars.peek().copied().map_or(false, is_strong_delimiter)
        } else {
            is_weak_delimiter(ch) && char_count >= config.weak_split_chars
        };

        if should_split {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                segments.push(trimmed.to_string());
            }
            current.clear();
            char_count = 0;
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }

    segments
}

/// 合并短片段直到满足 min_chars
fn merge_until_min_chars(segments: Vec<String>, min_chars: usize) -> Vec<String> {
    if min_chars == 0 || segments.is_empty() {
        return segments;
    }

    let mut result: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for seg in segments {
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(&seg);

        if buffer.chars().count() >= min_chars {
            result.push(std::mem::take(&mut buffer));
        }
    }

    if !buffer.is_empty() {
        match result.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&buffer);
            }
            None => result.push(buffer),
        }
    }

    result
}

/// 对文本进行分句
///
/// 1. 按行分割，跨行不合并
/// 2. 每行按标点分句，再按 min_chars 合并短句
/// 3. 只有引号的片段并入前一句
pub fn segment_text(text: &str, config: &SegmentConfig) -> Vec<SplitSentence> {
    let mut sentences: Vec<SplitSentence> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parts = merge_until_min_chars(split_by_delimiters(line, config), config.min_chars);
        for part in parts {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }

            if is_trivial_segment(trimmed) {
                if let Some(last) = sentences.last_mut() {
                    last.original.push_str(trimmed);
                    last.text.push_str(trimmed);
                }
                continue;
            }

            sentences.push(SplitSentence {
                text: collapse_whitespace(trimmed),
                original: trimmed.to_string(),
            });
        }
    }

    sentences
}

/// 使用默认配置分句
pub fn segment_text_default(text: &str) -> Vec<SplitSentence> {
    segment_text(text, &SegmentConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(sentences: &[SplitSentence]) -> Vec<&str> {
        sentences.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_splits_on_sentence_punctuation() {
        let sentences = segment_text_default("First. Second. Third.");
        assert_eq!(texts(&sentences), vec!["First.", "Second.", "Third."]);
    }

    #[test]
    fn test_repeated_terminators_stay_together() {
        let sentences = segment_text_default("Really?! Yes... Fine.");
        assert_eq!(texts(&sentences), vec!["Really?!", "Yes...", "Fine."]);
    }

    #[test]
    fn test_weak_delimiter_only_splits_long_sentences() {
        let config = SegmentConfig {
            min_chars: 0,
            weak_split_chars: 10,
        };
        // 第一个逗号处只有 6 个字符，不分割
        let sentences = segment_text("Short, then a longer clause, end.", &config);
        assert_eq!(
            texts(&sentences),
            vec!["Short, then a longer clause,", "end."]
        );

        let default = segment_text_default("Short, then a longer clause, end.");
        assert_eq!(default.len(), 1);
    }

    #[test]
    fn test_min_chars_merges_short_sentences() {
        let config = SegmentConfig {
            min_chars: 12,
            weak_split_chars: DEFAULT_WEAK_SPLIT_CHARS,
        };
        let sentences = segment_text("Hi. Yo. A longer sentence here.", &config);
        assert_eq!(texts(&sentences), vec!["Hi. Yo. A longer sentence here."]);
    }

    #[test]
    fn test_lines_do_not_cross_merge() {
        let config = SegmentConfig {
            min_chars: 50,
            weak_split_chars: DEFAULT_WEAK_SPLIT_CHARS,
        };
        let sentences = segment_text("Line one.\nLine two.", &config);
        assert_eq!(texts(&sentences), vec!["Line one.", "Line two."]);
    }

    #[test]
    fn test_quote_only_segment_merged_into_previous() {
        let sentences = segment_text_default("He said hello.\n\"\nThen he left.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].text.ends_with('"'));
    }

    #[test]
    fn test_whitespace_collapsed_in_text_but_not_original() {
        let sentences = segment_text_default("Too   many\tspaces.");
        assert_eq!(sentences[0].text, "Too many spaces.");
        assert_eq!(sentences[0].original, "Too   many\tspaces.");
    }
}
