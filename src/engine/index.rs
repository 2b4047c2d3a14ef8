//! One index: metadata, document store, searchable state and pending writes.
//!
//! Lock order is `write_lock` → `store` → `pending` → `searchable`. Writers
//! of one index serialize on `write_lock`; different indices share nothing.
//! Searches hold the `searchable` guards of several indices at once and take
//! them in index name order.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::analysis::FieldAnalyzers;
use crate::document::{DocumentParser, Source};
use crate::engine::clock::Clock;
use crate::engine::refresh::{PendingAction, PendingOp, RefreshQueue};
use crate::engine::responses::{DocWriteResponse, GetResponse, IndexStats, UpdateRequest, WriteResult};
use crate::error::{QuarryError, Result};
use crate::schema::{IndexMetadata, Mapping, RefreshInterval};
use crate::search::SearchableState;
use crate::store::{DocumentStore, WriteOutcome};

/// Characters never allowed in an index name.
const FORBIDDEN_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ':'];

/// Check an index name against the naming rules.
pub fn validate_index_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("must not be empty".to_string())
    } else if name == "." || name == ".." {
        Some("must not be '.' or '..'".to_string())
    } else if name.starts_with(['_', '-', '+']) {
        Some("must not start with '_', '-', or '+'".to_string())
    } else if name.chars().any(char::is_uppercase) {
        Some("must be lowercase".to_string())
    } else if let Some(c) = name.chars().find(|c| c.is_whitespace() || FORBIDDEN_CHARS.contains(c)) {
        Some(format!("must not contain '{c}'"))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(QuarryError::invalid_index_name(name, reason)),
        None => Ok(()),
    }
}

/// How a write treats an existing live document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with a version conflict.
    Create,
    /// Replace it.
    Index,
}

#[derive(Debug)]
pub struct Index {
    name: String,
    metadata: RwLock<Arc<IndexMetadata>>,
    store: RwLock<DocumentStore>,
    searchable: RwLock<SearchableState>,
    pending: Mutex<RefreshQueue>,
    write_lock: Mutex<()>,
    refresh_interval: RefreshInterval,
    clock: Arc<dyn Clock>,
}

impl Index {
    pub fn new(
        metadata: IndexMetadata,
        analyzers: Arc<FieldAnalyzers>,
        default_refresh_interval: RefreshInterval,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = metadata.name.clone();
        let refresh_interval = metadata
            .settings
            .refresh_interval
            .unwrap_or(default_refresh_interval);
        Index {
            store: RwLock::new(DocumentStore::new(name.clone())),
            searchable: RwLock::new(SearchableState::new(name.clone(), analyzers)),
            metadata: RwLock::new(Arc::new(metadata)),
            pending: Mutex::new(RefreshQueue::new()),
            write_lock: Mutex::new(()),
            refresh_interval,
            clock,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A snapshot of the current metadata.
    pub fn metadata(&self) -> Arc<IndexMetadata> {
        Arc::clone(&self.metadata.read())
    }

    pub fn mapping(&self) -> Mapping {
        self.metadata().mapping.clone()
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        self.refresh_interval
    }

    /// Create or replace a document. A missing id is generated.
    pub fn write(&self, id: Option<&str>, source: Source, mode: WriteMode) -> Result<DocWriteResponse> {
        let id = match id {
            Some(id) if id.is_empty() => {
                return Err(QuarryError::invalid_request("document id must not be empty"));
            }
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };

        let _writer = self.write_lock.lock();
        if mode == WriteMode::Create {
            self.store.read().ensure_absent(&id)?;
        }
        self.put(&id, source)
    }

    /// Merge `request.doc` into a live document, or create it from the
    /// request's upsert source.
    pub fn update(&self, id: &str, request: &UpdateRequest) -> Result<DocWriteResponse> {
        let _writer = self.write_lock.lock();
        let merged = self.store.read().merged_source(id, &request.doc);
        match merged {
            Ok(source) => self.put(id, source),
            Err(err) if err.is_not_found() => match request.upsert_source() {
                Some(upsert) => self.put(id, upsert.clone()),
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    pub fn delete(&self, id: &str) -> Result<DocWriteResponse> {
        let _writer = self.write_lock.lock();
        let tombstone = self.store.write().delete(id)?;
        self.enqueue(id, tombstone.seq_no, PendingAction::Delete);
        tracing::trace!("deleted [{}][{id}] version {}", self.name, tombstone.version);
        Ok(DocWriteResponse {
            index: self.name.clone(),
            id: id.to_string(),
            version: tombstone.version,
            seq_no: tombstone.seq_no,
            result: WriteResult::Deleted,
        })
    }

    /// Parse, store and enqueue. Caller holds `write_lock`.
    fn put(&self, id: &str, source: Source) -> Result<DocWriteResponse> {
        let metadata = self.metadata();
        let mut parsed = DocumentParser::parse(&source, &metadata.mapping)?;
        if let Some(mapping) = parsed.mapping_update.take() {
            tracing::debug!("dynamic mapping update in [{}] from document [{id}]", self.name);
            *self.metadata.write() = Arc::new(metadata.with_mapping(mapping));
        }

        let source = Arc::new(source);
        let WriteOutcome { document, created } = self.store.write().put(id, source.as_ref().clone());
        self.enqueue(
            id,
            document.seq_no,
            PendingAction::Upsert {
                version: document.version,
                source,
                parsed,
            },
        );
        tracing::trace!("indexed [{}][{id}] version {}", self.name, document.version);
        Ok(DocWriteResponse {
            index: self.name.clone(),
            id: id.to_string(),
            version: document.version,
            seq_no: document.seq_no,
            result: if created {
                WriteResult::Created
            } else {
                WriteResult::Updated
            },
        })
    }

    fn enqueue(&self, id: &str, seq_no: u64, action: PendingAction) {
        self.pending.lock().push(PendingOp {
            id: id.to_string(),
            seq_no,
            action,
            enqueued_at: self.clock.now(),
        });
    }

    /// Realtime get from the store.
    pub fn get(&self, id: &str) -> GetResponse {
        match self.store.read().get(id) {
            Some(doc) => GetResponse {
                index: self.name.clone(),
                id: id.to_string(),
                found: true,
                version: Some(doc.version),
                seq_no: Some(doc.seq_no),
                source: Some(doc.source.clone()),
            },
            None => GetResponse::not_found(&self.name, id),
        }
    }

    /// The live source of a document, for query rewriting.
    pub fn source(&self, id: &str) -> Option<Source> {
        self.store.read().get(id).map(|doc| doc.source.clone())
    }

    /// Apply the pending writes that are due. Returns how many were applied.
    pub fn refresh_due(&self) -> usize {
        let mut pending = self.pending.lock();
        let due = pending.drain_due(self.clock.now(), self.refresh_interval);
        self.apply(due)
    }

    /// Apply every pending write.
    pub fn refresh(&self) -> usize {
        let mut pending = self.pending.lock();
        let all = pending.drain_all();
        self.apply(all)
    }

    /// Caller holds `pending`, so concurrent refreshes apply in order.
    fn apply(&self, ops: Vec<PendingOp>) -> usize {
        if ops.is_empty() {
            return 0;
        }
        let applied = ops.len();
        let metadata = self.metadata();
        let mut searchable = self.searchable.write();
        for op in ops {
            match op.action {
                PendingAction::Upsert {
                    version,
                    source,
                    parsed,
                } => {
                    if let Err(err) =
                        searchable.upsert(&op.id, version, op.seq_no, source, &parsed, &metadata.mapping)
                    {
                        tracing::warn!("failed to make [{}][{}] searchable: {err}", self.name, op.id);
                    }
                }
                PendingAction::Delete => {
                    searchable.delete(&op.id);
                }
            }
        }
        tracing::debug!("refreshed [{}]: applied {applied} pending write(s)", self.name);
        applied
    }

    /// Read access to the refreshed state.
    pub fn searchable(&self) -> RwLockReadGuard<'_, SearchableState> {
        self.searchable.read()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop tombstones from the store. Returns how many were purged.
    pub fn compact(&self) -> usize {
        let _writer = self.write_lock.lock();
        let purged = self.store.write().compact();
        tracing::debug!("compacted [{}]: purged {purged} tombstone(s)", self.name);
        purged
    }

    pub fn stats(&self) -> IndexStats {
        let (docs_count, docs_deleted) = {
            let store = self.store.read();
            (store.live_count(), store.tombstone_count())
        };
        let pending_refreshes = self.pending_count();
        let searchable = self.searchable.read();
        IndexStats {
            index: self.name.clone(),
            docs_count,
            docs_deleted,
            searchable_docs: searchable.len(),
            pending_refreshes,
            term_count: searchable.inverted().term_count(),
            percolator_queries: searchable.percolator().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::clock::ManualClock;
    use crate::schema::IndexSettings;
    use serde_json::{Value, json};

    fn source(value: Value) -> Source {
        value.as_object().cloned().unwrap()
    }

    fn index(clock: &ManualClock) -> Index {
        Index::new(
            IndexMetadata::new("library", IndexSettings::new(), Mapping::new()),
            Arc::new(FieldAnalyzers::new().unwrap()),
            RefreshInterval::Every(Duration::from_secs(1)),
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn test_index_names() {
        for good in ["bank", "library", "logs-2024.01", "a_b"] {
            validate_index_name(good).unwrap();
        }
        for bad in ["", ".", "..", "_hidden", "-x", "+x", "Bank", "a b", "a/b", "a*", "a:b", "a,b"] {
            assert!(
                matches!(validate_index_name(bad), Err(QuarryError::InvalidIndexName { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_write_becomes_visible_after_interval() {
        let clock = ManualClock::new();
        let index = index(&clock);
        let response = index
            .write(Some("1"), source(json!({"title": "Think Big"})), WriteMode::Create)
            .unwrap();
        assert_eq!(response.result, WriteResult::Created);
        assert!(index.get("1").found);
        assert_eq!(index.refresh_due(), 0);
        assert!(index.searchable().is_empty());

        clock.advance(Duration::from_secs(1));
        assert_eq!(index.refresh_due(), 1);
        assert_eq!(index.searchable().len(), 1);
        assert_eq!(index.stats().pending_refreshes, 0);
    }

    #[test]
    fn test_create_conflict_and_generated_ids() {
        let clock = ManualClock::new();
        let index = index(&clock);
        index.write(Some("1"), source(json!({"n": 1})), WriteMode::Create).unwrap();
        let err = index
            .write(Some("1"), source(json!({"n": 2})), WriteMode::Create)
            .unwrap_err();
        assert!(matches!(err, QuarryError::VersionConflict { .. }));

        let generated = index.write(None, source(json!({"n": 3})), WriteMode::Create).unwrap();
        assert_eq!(generated.id.len(), 32);
        assert!(index.write(Some(""), source(json!({})), WriteMode::Index).is_err());
    }

    #[test]
    fn test_mapping_conflict_leaves_store_untouched() {
        let clock = ManualClock::new();
        let index = index(&clock);
        index.write(Some("1"), source(json!({"price": 10})), WriteMode::Index).unwrap();
        let err = index
            .write(Some("2"), source(json!({"price": "cheap"})), WriteMode::Index)
            .unwrap_err();
        assert!(matches!(err, QuarryError::MappingConflict { .. }));
        assert!(!index.get("2").found);
        assert_eq!(index.pending_count(), 1);
    }

    #[test]
    fn test_update_and_upsert() {
        let clock = ManualClock::new();
        let index = index(&clock);
        let patch = UpdateRequest::new(source(json!({"price": 12})));
        assert!(index.update("1", &patch).unwrap_err().is_not_found());

        let created = index.update("1", &patch.clone().with_doc_as_upsert()).unwrap();
        assert_eq!(created.result, WriteResult::Created);
        let updated = index.update("1", &UpdateRequest::new(source(json!({"title": "x"})))).unwrap();
        assert_eq!(updated.result, WriteResult::Updated);
        assert_eq!(updated.version, 2);
        assert_eq!(
            index.get("1").source,
            Some(source(json!({"price": 12, "title": "x"})))
        );
    }

    #[test]
    fn test_delete_refresh_and_compact() {
        let clock = ManualClock::new();
        let index = index(&clock);
        index.write(Some("1"), source(json!({"title": "a"})), WriteMode::Index).unwrap();
        index.refresh();
        assert_eq!(index.searchable().len(), 1);

        let deleted = index.delete("1").unwrap();
        assert_eq!(deleted.version, 2);
        assert!(!index.get("1").found);
        assert_eq!(index.searchable().len(), 1);
        index.refresh();
        assert!(index.searchable().is_empty());

        assert_eq!(index.stats().docs_deleted, 1);
        assert_eq!(index.compact(), 1);
        assert_eq!(index.stats().docs_deleted, 0);
    }
}
