//! Keyword analyzer that treats the entire input as a single token.
//!
//! Used for `keyword` fields and the `.keyword` sub-field that dynamic
//! mapping adds to every string field.
//!
//! # Examples
//!
//! ```
//! use quarry::analysis::{Analyzer, KeywordAnalyzer};
//!
//! let analyzer = KeywordAnalyzer::new();
//! assert_eq!(analyzer.terms("New York").unwrap(), vec!["New York"]);
//! ```

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// An analyzer that emits its input unchanged as one token.
///
/// Empty input yields no token, so an empty string is never a searchable
/// keyword.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        if text.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        let token = Token::with_offsets(text, 0, 0, text.len());
        Ok(Box::new(std::iter::once(token)))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_analyzer() {
        let analyzer = KeywordAnalyzer::new();
        let tokens = analyzer.tokens("user-123-ABC").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "user-123-ABC");
        assert_eq!(analyzer.name(), "keyword");
    }

    #[test]
    fn test_keyword_offsets_and_empty_input() {
        let analyzer = KeywordAnalyzer::new();
        let tokens = analyzer.tokens("São Paulo").unwrap();
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[0].start_offset, 0);
        assert_eq!(tokens[0].end_offset, "São Paulo".len());

        assert!(analyzer.tokens("").unwrap().is_empty());
        // Whitespace is kept as it is.
        assert_eq!(analyzer.terms(" padded ").unwrap(), vec![" padded "]);
    }
}
