//! Bulk requests in the newline-delimited action/source format.

use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::document::Source;
use crate::engine::responses::{DocWriteResponse, UpdateRequest, WriteResult};
use crate::error::{QuarryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOp {
    Index,
    Create,
    Update,
    Delete,
}

impl BulkOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkOp::Index => "index",
            BulkOp::Create => "create",
            BulkOp::Update => "update",
            BulkOp::Delete => "delete",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "index" => Some(BulkOp::Index),
            "create" => Some(BulkOp::Create),
            "update" => Some(BulkOp::Update),
            "delete" => Some(BulkOp::Delete),
            _ => None,
        }
    }
}

/// One bulk item. `index` falls back to the request's default index.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    Index {
        index: Option<String>,
        id: Option<String>,
        source: Source,
    },
    Create {
        index: Option<String>,
        id: Option<String>,
        source: Source,
    },
    Update {
        index: Option<String>,
        id: String,
        request: UpdateRequest,
    },
    Delete {
        index: Option<String>,
        id: String,
    },
}

impl BulkAction {
    pub fn op(&self) -> BulkOp {
        match self {
            BulkAction::Index { .. } => BulkOp::Index,
            BulkAction::Create { .. } => BulkOp::Create,
            BulkAction::Update { .. } => BulkOp::Update,
            BulkAction::Delete { .. } => BulkOp::Delete,
        }
    }

    pub fn index(&self) -> Option<&str> {
        match self {
            BulkAction::Index { index, .. }
            | BulkAction::Create { index, .. }
            | BulkAction::Update { index, .. }
            | BulkAction::Delete { index, .. } => index.as_deref(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            BulkAction::Index { id, .. } | BulkAction::Create { id, .. } => id.as_deref(),
            BulkAction::Update { id, .. } | BulkAction::Delete { id, .. } => Some(id),
        }
    }
}

/// An ordered batch of document writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkRequest {
    pub actions: Vec<BulkAction>,
}

impl BulkRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index<I: Into<String>, D: Into<String>>(mut self, index: I, id: D, source: Source) -> Self {
        self.actions.push(BulkAction::Index {
            index: Some(index.into()),
            id: Some(id.into()),
            source,
        });
        self
    }

    pub fn create<I: Into<String>, D: Into<String>>(mut self, index: I, id: D, source: Source) -> Self {
        self.actions.push(BulkAction::Create {
            index: Some(index.into()),
            id: Some(id.into()),
            source,
        });
        self
    }

    pub fn update<I: Into<String>, D: Into<String>>(mut self, index: I, id: D, request: UpdateRequest) -> Self {
        self.actions.push(BulkAction::Update {
            index: Some(index.into()),
            id: id.into(),
            request,
        });
        self
    }

    pub fn delete<I: Into<String>, D: Into<String>>(mut self, index: I, id: D) -> Self {
        self.actions.push(BulkAction::Delete {
            index: Some(index.into()),
            id: id.into(),
        });
        self
    }

    pub fn push(&mut self, action: BulkAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Parse the newline-delimited bulk format. Blank lines are skipped.
    pub fn from_ndjson(body: &str) -> Result<Self> {
        let mut values = Vec::new();
        for (number, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|err| {
                QuarryError::invalid_request(format!("malformed bulk line {}: {err}", number + 1))
            })?;
            values.push(value);
        }
        BulkRequest::from_values(values)
    }

    /// Build from already-parsed lines: each action object followed by its
    /// source (index, create) or update body (update).
    pub fn from_values<I: IntoIterator<Item = Value>>(values: I) -> Result<Self> {
        let mut lines = values.into_iter();
        let mut request = BulkRequest::new();
        while let Some(action_line) = lines.next() {
            let (op, meta) = parse_action_line(&action_line)?;
            let index = meta_string(meta, "_index")?;
            let id = meta_string(meta, "_id")?;
            let mut body = || {
                lines.next().ok_or_else(|| {
                    QuarryError::invalid_request(format!(
                        "bulk [{}] action is missing its source line",
                        op.as_str()
                    ))
                })
            };
            let action = match op {
                BulkOp::Index => BulkAction::Index {
                    index,
                    id,
                    source: source_object(body()?)?,
                },
                BulkOp::Create => BulkAction::Create {
                    index,
                    id,
                    source: source_object(body()?)?,
                },
                BulkOp::Update => BulkAction::Update {
                    index,
                    id: required_id(op, id)?,
                    request: UpdateRequest::from_json(&body()?)?,
                },
                BulkOp::Delete => BulkAction::Delete {
                    index,
                    id: required_id(op, id)?,
                },
            };
            request.push(action);
        }
        Ok(request)
    }
}

fn parse_action_line(line: &Value) -> Result<(BulkOp, &Map<String, Value>)> {
    let object = line
        .as_object()
        .filter(|object| object.len() == 1)
        .ok_or_else(|| QuarryError::invalid_request(format!("malformed bulk action line {line}")))?;
    let (name, meta) = object
        .iter()
        .next()
        .ok_or_else(|| QuarryError::invalid_request("empty bulk action line"))?;
    let op = BulkOp::parse(name)
        .ok_or_else(|| QuarryError::invalid_request(format!("unknown bulk action [{name}]")))?;
    let meta = meta
        .as_object()
        .ok_or_else(|| QuarryError::invalid_request(format!("bulk [{name}] metadata must be an object")))?;
    Ok((op, meta))
}

/// A metadata value as a string. Numeric ids are accepted.
fn meta_string(meta: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match meta.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(QuarryError::invalid_request(format!(
            "bulk metadata [{key}] must be a string, got {other}"
        ))),
    }
}

fn required_id(op: BulkOp, id: Option<String>) -> Result<String> {
    id.ok_or_else(|| QuarryError::invalid_request(format!("bulk [{}] action requires an [_id]", op.as_str())))
}

fn source_object(value: Value) -> Result<Source> {
    match value {
        Value::Object(source) => Ok(source),
        other => Err(QuarryError::invalid_request(format!(
            "bulk source must be an object, got {other}"
        ))),
    }
}

/// Failure of one bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
    pub error_type: String,
    pub reason: String,
}

impl From<&QuarryError> for BulkItemError {
    fn from(err: &QuarryError) -> Self {
        BulkItemError {
            error_type: err.error_type().to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResponse {
    pub op: BulkOp,
    pub index: String,
    pub id: String,
    pub status: u16,
    pub result: Option<WriteResult>,
    pub version: Option<u64>,
    pub seq_no: Option<u64>,
    pub error: Option<BulkItemError>,
}

impl BulkItemResponse {
    pub fn success(op: BulkOp, response: DocWriteResponse) -> Self {
        BulkItemResponse {
            op,
            status: response.result.status(),
            result: Some(response.result),
            version: Some(response.version),
            seq_no: Some(response.seq_no),
            index: response.index,
            id: response.id,
            error: None,
        }
    }

    pub fn failure(op: BulkOp, index: &str, id: &str, err: &QuarryError) -> Self {
        BulkItemResponse {
            op,
            index: index.to_string(),
            id: id.to_string(),
            status: err.status(),
            result: None,
            version: None,
            seq_no: None,
            error: Some(BulkItemError::from(err)),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_json(&self) -> Value {
        let mut item = json!({
            "_index": self.index,
            "_id": self.id,
            "status": self.status,
        });
        if let Some(result) = self.result {
            item["result"] = json!(result.as_str());
        }
        if let Some(version) = self.version {
            item["_version"] = json!(version);
        }
        if let Some(seq_no) = self.seq_no {
            item["_seq_no"] = json!(seq_no);
        }
        if let Some(error) = &self.error {
            item["error"] = json!({"type": error.error_type, "reason": error.reason});
        }
        let mut wrapper = Map::new();
        wrapper.insert(self.op.as_str().to_string(), item);
        Value::Object(wrapper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkResponse {
    pub took: Duration,
    /// Whether any item failed.
    pub errors: bool,
    pub items: Vec<BulkItemResponse>,
}

impl BulkResponse {
    pub fn new(took: Duration, items: Vec<BulkItemResponse>) -> Self {
        BulkResponse {
            took,
            errors: items.iter().any(BulkItemResponse::is_failure),
            items,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "took": self.took.as_millis() as u64,
            "errors": self.errors,
            "items": self.items.iter().map(BulkItemResponse::to_json).collect::<Vec<_>>(),
        })
    }
}
