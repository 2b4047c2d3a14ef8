//! Analyzer selection by field type.

use std::sync::Arc;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::analyzer::keyword::KeywordAnalyzer;
use crate::analysis::analyzer::standard::StandardAnalyzer;
use crate::error::Result;
use crate::schema::FieldType;

/// The analyzers an index uses, chosen by the type of the field being analyzed.
///
/// Cloning is cheap; both analyzers are shared.
#[derive(Clone)]
pub struct FieldAnalyzers {
    text: Arc<dyn Analyzer>,
    keyword: Arc<dyn Analyzer>,
}

impl FieldAnalyzers {
    /// Standard analyzer for text, keyword analyzer for keyword.
    pub fn new() -> Result<Self> {
        Ok(FieldAnalyzers {
            text: Arc::new(StandardAnalyzer::new()?),
            keyword: Arc::new(KeywordAnalyzer::new()),
        })
    }

    /// The analyzer for `text` fields.
    pub fn text(&self) -> &Arc<dyn Analyzer> {
        &self.text
    }

    /// The analyzer for `keyword` fields.
    pub fn keyword(&self) -> &Arc<dyn Analyzer> {
        &self.keyword
    }

    /// The analyzer for a field type, if that type is indexed as terms.
    pub fn for_type(&self, field_type: FieldType) -> Option<&Arc<dyn Analyzer>> {
        match field_type {
            FieldType::Text => Some(&self.text),
            FieldType::Keyword => Some(&self.keyword),
            _ => None,
        }
    }
}

impl std::fmt::Debug for FieldAnalyzers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAnalyzers")
            .field("text", &self.text.name())
            .field("keyword", &self.keyword.name())
            .finish()
    }
}
