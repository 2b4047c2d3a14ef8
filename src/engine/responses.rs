//! Request and response types of index and document operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::document::Source;
use crate::error::{QuarryError, Result};

/// Outcome of a document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteResult {
    Created,
    Updated,
    Deleted,
}

impl WriteResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteResult::Created => "created",
            WriteResult::Updated => "updated",
            WriteResult::Deleted => "deleted",
        }
    }

    /// HTTP-style status of a successful write with this outcome.
    pub fn status(&self) -> u16 {
        match self {
            WriteResult::Created => 201,
            WriteResult::Updated | WriteResult::Deleted => 200,
        }
    }
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to create, index, update and delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocWriteResponse {
    pub index: String,
    pub id: String,
    pub version: u64,
    pub seq_no: u64,
    pub result: WriteResult,
}

impl DocWriteResponse {
    pub fn to_json(&self) -> Value {
        json!({
            "_index": self.index,
            "_id": self.id,
            "_version": self.version,
            "_seq_no": self.seq_no,
            "result": self.result.as_str(),
        })
    }
}

/// Response to a realtime get.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResponse {
    pub index: String,
    pub id: String,
    pub found: bool,
    pub version: Option<u64>,
    pub seq_no: Option<u64>,
    pub source: Option<Source>,
}

impl GetResponse {
    pub fn not_found<I: Into<String>, D: Into<String>>(index: I, id: D) -> Self {
        GetResponse {
            index: index.into(),
            id: id.into(),
            found: false,
            version: None,
            seq_no: None,
            source: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "_index": self.index,
            "_id": self.id,
            "found": self.found,
        });
        if let Some(version) = self.version {
            body["_version"] = json!(version);
        }
        if let Some(seq_no) = self.seq_no {
            body["_seq_no"] = json!(seq_no);
        }
        if let Some(source) = &self.source {
            body["_source"] = Value::Object(source.clone());
        }
        body
    }
}

/// Acknowledgement of an index lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledged {
    pub acknowledged: bool,
    pub shards_acknowledged: bool,
    pub index: String,
}

impl Acknowledged {
    pub fn new<S: Into<String>>(index: S) -> Self {
        Acknowledged {
            acknowledged: true,
            shards_acknowledged: true,
            index: index.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "acknowledged": self.acknowledged,
            "shards_acknowledged": self.shards_acknowledged,
            "index": self.index,
        })
    }
}

/// A partial update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateRequest {
    /// Fields merged into the current source.
    pub doc: Source,
    /// Source created when the document does not exist.
    pub upsert: Option<Source>,
    /// Create the document from `doc` when it does not exist.
    pub doc_as_upsert: bool,
}

impl UpdateRequest {
    pub fn new(doc: Source) -> Self {
        UpdateRequest {
            doc,
            ..Default::default()
        }
    }

    pub fn with_upsert(mut self, upsert: Source) -> Self {
        self.upsert = Some(upsert);
        self
    }

    pub fn with_doc_as_upsert(mut self) -> Self {
        self.doc_as_upsert = true;
        self
    }

    /// The source to create when the target is missing, if any.
    pub fn upsert_source(&self) -> Option<&Source> {
        match (&self.upsert, self.doc_as_upsert) {
            (Some(upsert), _) => Some(upsert),
            (None, true) => Some(&self.doc),
            (None, false) => None,
        }
    }

    /// Parse an update body: `{"doc": {...}, "upsert"?: {...}, "doc_as_upsert"?: bool}`.
    pub fn from_json(body: &Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| QuarryError::invalid_request("update body must be an object"))?;
        let mut request = UpdateRequest::default();
        for (key, value) in object {
            match (key.as_str(), value) {
                ("doc", Value::Object(doc)) => request.doc = doc.clone(),
                ("upsert", Value::Object(upsert)) => request.upsert = Some(upsert.clone()),
                ("doc_as_upsert", Value::Bool(flag)) => request.doc_as_upsert = *flag,
                ("script", _) => {
                    return Err(QuarryError::invalid_request(
                        "scripted updates are not supported",
                    ));
                }
                (key, value) => {
                    return Err(QuarryError::invalid_request(format!(
                        "invalid update attribute [{key}]: {value}"
                    )));
                }
            }
        }
        if !object.contains_key("doc") && request.upsert.is_none() {
            return Err(QuarryError::invalid_request("update requires [doc] or [upsert]"));
        }
        Ok(request)
    }
}

/// Counters of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub index: String,
    /// Live documents in the store.
    pub docs_count: usize,
    /// Tombstones not yet compacted away.
    pub docs_deleted: usize,
    /// Documents visible to search.
    pub searchable_docs: usize,
    /// Writes waiting for a refresh.
    pub pending_refreshes: usize,
    pub term_count: usize,
    pub percolator_queries: usize,
}

impl IndexStats {
    pub fn to_json(&self) -> Value {
        json!({
            "index": self.index,
            "docs": {"count": self.docs_count, "deleted": self.docs_deleted},
            "search": {"docs": self.searchable_docs, "terms": self.term_count},
            "refresh": {"pending": self.pending_refreshes},
            "percolator": {"queries": self.percolator_queries},
        })
    }
}
