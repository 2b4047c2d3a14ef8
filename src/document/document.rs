//! Stored documents and source merging.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document body: a JSON object with insertion order preserved.
pub type Source = Map<String, Value>;

/// The canonical record of one document id in an index.
///
/// Deleting keeps the record as a tombstone so the next write of the same id
/// continues its version sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub version: u64,
    pub seq_no: u64,
    pub source: Source,
    pub deleted: bool,
}

impl StoredDocument {
    pub fn new<S: Into<String>>(id: S, version: u64, seq_no: u64, source: Source) -> Self {
        StoredDocument {
            id: id.into(),
            version,
            seq_no,
            source,
            deleted: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// Deep-merge `patch` into `target`: objects merge recursively, every other
/// value (arrays included) replaces what was there.
pub fn merge_source(target: &mut Source, patch: &Source) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_source(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
