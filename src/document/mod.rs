//! Documents: stored sources, typed field values and mapping-driven parsing.

#[allow(clippy::module_inception)]
pub mod document;
pub mod field_value;
pub mod parser;

pub use document::{Source, StoredDocument, merge_source};
pub use field_value::FieldValue;
pub use parser::{DocumentParser, ParsedDocument, ParsedField};
