//! The canonical, versioned document store of an index.

pub mod document_store;

pub use document_store::{DocumentStore, WriteOutcome};
