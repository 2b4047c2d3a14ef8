//! Error types for the Quarry engine.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`QuarryError`] enum. Variants map onto the outcomes a document store
//! reports to its callers: missing indices or documents, version conflicts,
//! mapping violations and malformed queries.
//!
//! # Examples
//!
//! ```
//! use quarry::error::{QuarryError, Result};
//!
//! fn lookup(name: &str) -> Result<()> {
//!     Err(QuarryError::index_not_found(name))
//! }
//!
//! let err = lookup("bank").unwrap_err();
//! assert_eq!(err.error_type(), "index_not_found_exception");
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Quarry operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// The named index does not exist.
    #[error("no such index [{0}]")]
    IndexNotFound(String),

    /// An index with this name already exists.
    #[error("index [{0}] already exists")]
    IndexAlreadyExists(String),

    /// The index name violates naming rules.
    #[error("invalid index name [{name}], {reason}")]
    InvalidIndexName { name: String, reason: String },

    /// The document does not exist or is tombstoned.
    #[error("[{id}]: document missing in index [{index}]")]
    DocumentNotFound { index: String, id: String },

    /// A live document with this id already exists.
    #[error("[{id}]: version conflict, document already exists in index [{index}]")]
    VersionConflict { index: String, id: String },

    /// A field value does not fit the field's declared type.
    #[error("failed to parse field [{field}] of type [{expected}]: got {actual}")]
    MappingConflict {
        field: String,
        expected: String,
        actual: String,
    },

    /// The query tree is malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The request body is malformed (bulk lines, settings, mappings).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A script predicate could not be evaluated for a document.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    /// I/O errors (loading configuration or data files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with QuarryError.
pub type Result<T> = std::result::Result<T, QuarryError>;

impl QuarryError {
    /// Create an index-not-found error.
    pub fn index_not_found<S: Into<String>>(index: S) -> Self {
        QuarryError::IndexNotFound(index.into())
    }

    /// Create an index-already-exists error.
    pub fn index_already_exists<S: Into<String>>(index: S) -> Self {
        QuarryError::IndexAlreadyExists(index.into())
    }

    /// Create an invalid-index-name error.
    pub fn invalid_index_name<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        QuarryError::InvalidIndexName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a document-not-found error.
    pub fn document_not_found<I: Into<String>, D: Into<String>>(index: I, id: D) -> Self {
        QuarryError::DocumentNotFound {
            index: index.into(),
            id: id.into(),
        }
    }

    /// Create a version conflict error for a duplicate create.
    pub fn version_conflict<I: Into<String>, D: Into<String>>(index: I, id: D) -> Self {
        QuarryError::VersionConflict {
            index: index.into(),
            id: id.into(),
        }
    }

    /// Create a mapping conflict error.
    pub fn mapping_conflict<F, E, A>(field: F, expected: E, actual: A) -> Self
    where
        F: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        QuarryError::MappingConflict {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid query error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        QuarryError::InvalidQuery(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        QuarryError::InvalidRequest(msg.into())
    }

    /// Create a script evaluation error.
    pub fn evaluation<S: Into<String>>(msg: S) -> Self {
        QuarryError::Evaluation(msg.into())
    }

    /// Elasticsearch-style error type name, reported in bulk items and CLI output.
    pub fn error_type(&self) -> &'static str {
        match self {
            QuarryError::IndexNotFound(_) => "index_not_found_exception",
            QuarryError::IndexAlreadyExists(_) => "resource_already_exists_exception",
            QuarryError::InvalidIndexName { .. } => "invalid_index_name_exception",
            QuarryError::DocumentNotFound { .. } => "document_missing_exception",
            QuarryError::VersionConflict { .. } => "version_conflict_engine_exception",
            QuarryError::MappingConflict { .. } => "mapper_parsing_exception",
            QuarryError::InvalidQuery(_) => "parsing_exception",
            QuarryError::InvalidRequest(_) => "illegal_argument_exception",
            QuarryError::Evaluation(_) => "script_exception",
            QuarryError::Io(_) => "io_exception",
            QuarryError::Json(_) => "json_parse_exception",
            QuarryError::Anyhow(_) => "exception",
        }
    }

    /// HTTP-like status code for this error, as reported by bulk items.
    pub fn status(&self) -> u16 {
        match self {
            QuarryError::IndexNotFound(_) | QuarryError::DocumentNotFound { .. } => 404,
            QuarryError::IndexAlreadyExists(_) | QuarryError::VersionConflict { .. } => 409,
            QuarryError::Io(_) | QuarryError::Anyhow(_) => 500,
            _ => 400,
        }
    }

    /// Whether this error reports a missing index or document.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QuarryError::IndexNotFound(_) | QuarryError::DocumentNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = QuarryError::document_not_found("library", "1");
        assert_eq!(
            error.to_string(),
            "[1]: document missing in index [library]"
        );
        assert!(error.is_not_found());
        assert_eq!(error.status(), 404);

        let error = QuarryError::mapping_conflict("price", "integer", "\"cheap\"");
        assert_eq!(error.error_type(), "mapper_parsing_exception");
        assert_eq!(error.status(), 400);
    }

    #[test]
    fn test_conflict_status() {
        let error = QuarryError::version_conflict("bank", "7");
        assert_eq!(error.status(), 409);
        assert_eq!(error.error_type(), "version_conflict_engine_exception");
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: QuarryError = json_error.into();
        assert!(matches!(error, QuarryError::Json(_)));
    }
}
