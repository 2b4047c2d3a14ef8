//! Text analysis for Quarry.
//!
//! Analysis turns field values and query text into terms. Indexing, `match`
//! queries, `more_like_this` like-texts and percolated documents all run
//! through the same analyzers, so a term produced at index time is always
//! reproducible at query time.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

pub use analyzer::{Analyzer, FieldAnalyzers, KeywordAnalyzer, PipelineAnalyzer, StandardAnalyzer};
pub use token::{Token, TokenStream};
pub use token_filter::{Filter, LowercaseFilter, MaxTokenLengthFilter};
pub use tokenizer::{RegexTokenizer, Tokenizer};
