//! Standard analyzer used for `text` fields.
//!
//! # Pipeline
//!
//! 1. RegexTokenizer (letters and digits, split on everything else)
//! 2. MaxTokenLengthFilter (255 characters)
//! 3. LowercaseFilter
//!
//! There is no stemming and no stop word list, so every word of the input
//! is searchable exactly as lowercased.
//!
//! # Examples
//!
//! ```
//! use quarry::analysis::{Analyzer, StandardAnalyzer};
//!
//! let analyzer = StandardAnalyzer::new().unwrap();
//! let terms = analyzer.terms("Thinking, Fast and Slow").unwrap();
//! assert_eq!(terms, vec!["thinking", "fast", "and", "slow"]);
//! ```

use std::sync::Arc;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::{LowercaseFilter, MaxTokenLengthFilter};
use crate::analysis::tokenizer::RegexTokenizer;
use crate::error::Result;

/// The default analyzer for full-text fields.
pub struct StandardAnalyzer {
    inner: PipelineAnalyzer,
}

impl StandardAnalyzer {
    /// Create a new standard analyzer.
    pub fn new() -> Result<Self> {
        let tokenizer = Arc::new(RegexTokenizer::new()?);
        let analyzer = PipelineAnalyzer::new(tokenizer)
            .add_filter(Arc::new(MaxTokenLengthFilter::default()))
            .add_filter(Arc::new(LowercaseFilter::new()))
            .with_name("standard");

        Ok(StandardAnalyzer { inner: analyzer })
    }

    /// Get the inner pipeline analyzer.
    pub fn inner(&self) -> &PipelineAnalyzer {
        &self.inner
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

impl std::fmt::Debug for StandardAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardAnalyzer")
            .field("inner", &self.inner)
            .finish()
    }
}
