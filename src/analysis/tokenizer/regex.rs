//! Regex-based tokenizer implementation.

use std::sync::Arc;

use regex::Regex;

use super::Tokenizer;
use crate::analysis::token::{Token, TokenStream};
use crate::error::{QuarryError, Result};

/// Letters and digits of any script; everything else is a boundary.
pub const ALPHANUMERIC_PATTERN: &str = r"[\p{L}\p{N}]+";

/// A tokenizer that extracts every match of a regular expression as a token.
///
/// The default pattern splits on every non-alphanumeric boundary, so
/// `"user-123_abc"` yields `user`, `123` and `abc`.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    pattern: Arc<Regex>,
}

impl RegexTokenizer {
    /// Create a new regex tokenizer with the alphanumeric pattern.
    pub fn new() -> Result<Self> {
        Self::with_pattern(ALPHANUMERIC_PATTERN)
    }

    /// Create a new regex tokenizer with a custom pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| QuarryError::invalid_request(format!("Invalid regex pattern: {e}")))?;

        Ok(RegexTokenizer {
            pattern: Arc::new(regex),
        })
    }

    /// Get the regex pattern used by this tokenizer.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = self
            .pattern
            .find_iter(text)
            .enumerate()
            .map(|(position, mat)| {
                Token::with_offsets(mat.as_str(), position, mat.start(), mat.end())
            })
            .collect();

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_tokenizer_splits_on_punctuation() {
        let tokenizer = RegexTokenizer::new().unwrap();
        let tokens: Vec<Token> = tokenizer
            .tokenize("Thinking, Fast and Slow (2011)")
            .unwrap()
            .collect();

        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Thinking", "Fast", "and", "Slow", "2011"]);
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[1].start_offset, 10);
        assert_eq!(tokens[1].end_offset, 14);
    }

    #[test]
    fn test_regex_tokenizer_unicode() {
        let tokenizer = RegexTokenizer::new().unwrap();
        let tokens: Vec<Token> = tokenizer.tokenize("Größe-über_x").unwrap().collect();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Größe", "über", "x"]);
    }

    #[test]
    fn test_custom_pattern() {
        let tokenizer = RegexTokenizer::with_pattern(r"\d+").unwrap();
        let tokens: Vec<Token> = tokenizer.tokenize("a1b22c333").unwrap().collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2].text, "333");
        assert_eq!(tokenizer.pattern(), r"\d+");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(RegexTokenizer::with_pattern("[").is_err());
    }
}
