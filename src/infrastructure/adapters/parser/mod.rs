//! Sentence Parser Adapter

mod punctuation_parser;

pub use punctuation_parser::PunctuationSentenceParser;
