//! The engine: a registry of indices and the operations over them.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;

use crate::analysis::FieldAnalyzers;
use crate::document::Source;
use crate::engine::bulk::{BulkAction, BulkItemResponse, BulkRequest, BulkResponse};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::config::EngineConfig;
use crate::engine::index::{Index, WriteMode, validate_index_name};
use crate::engine::refresh::RefreshScheduler;
use crate::engine::responses::{Acknowledged, DocWriteResponse, GetResponse, IndexStats, UpdateRequest};
use crate::error::{QuarryError, Result};
use crate::query::{DocumentLookup, QueryNode, needs_rewrite, rewrite};
use crate::schema::{IndexMetadata, IndexSettings, Mapping};
use crate::search::{IndexView, SearchRequest, SearchResponse, Searcher};

type Registry = DashMap<String, Arc<Index>>;

/// Which indices a search reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    All,
    Indices(Vec<String>),
}

impl SearchTarget {
    pub fn index<S: Into<String>>(name: S) -> Self {
        SearchTarget::Indices(vec![name.into()])
    }

    /// Parse a comma-separated index list. Empty, `_all` and `*` mean all.
    pub fn parse(target: &str) -> Self {
        let names: Vec<String> = target
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() || names.iter().any(|name| name == "_all" || name == "*") {
            SearchTarget::All
        } else {
            SearchTarget::Indices(names)
        }
    }
}

impl From<&str> for SearchTarget {
    fn from(target: &str) -> Self {
        SearchTarget::parse(target)
    }
}

/// Body of a create-index request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateIndexRequest {
    /// `None` applies the engine defaults.
    pub settings: Option<IndexSettings>,
    pub mapping: Mapping,
}

impl CreateIndexRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: IndexSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Parse `{"settings"?: {...}, "mappings"?: {...}}`.
    pub fn from_json(body: &Value, defaults: IndexSettings) -> Result<Self> {
        let object = match body {
            Value::Null => return Ok(CreateIndexRequest::new()),
            Value::Object(object) => object,
            other => {
                return Err(QuarryError::invalid_request(format!(
                    "create index body must be an object, got {other}"
                )));
            }
        };
        let mut request = CreateIndexRequest::new();
        for (key, value) in object {
            match key.as_str() {
                "settings" => request.settings = Some(IndexSettings::from_json(value, defaults.clone())?),
                "mappings" => request.mapping = Mapping::from_json(value)?,
                "aliases" => tracing::debug!("ignoring index aliases"),
                other => {
                    return Err(QuarryError::invalid_request(format!(
                        "unknown key [{other}] in create index request"
                    )));
                }
            }
        }
        Ok(request)
    }
}

/// An in-memory document search engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    indices: Arc<Registry>,
    analyzers: Arc<FieldAnalyzers>,
    clock: Arc<dyn Clock>,
    // Stopped when the engine drops.
    _scheduler: Option<RefreshScheduler>,
}

impl Engine {
    /// An engine with the default configuration and the system clock.
    pub fn new() -> Result<Self> {
        Engine::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Engine::with_clock(config, Arc::new(SystemClock))
    }

    /// An engine whose visibility delay is measured by `clock`.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let indices: Arc<Registry> = Arc::new(DashMap::new());
        let scheduler = if config.background_refresh {
            let registry = Arc::clone(&indices);
            Some(RefreshScheduler::start(config.scheduler_tick, move || {
                let due: Vec<Arc<Index>> = registry.iter().map(|entry| Arc::clone(entry.value())).collect();
                for index in due {
                    index.refresh_due();
                }
            })?)
        } else {
            None
        };
        tracing::info!(
            "engine started (refresh interval {:?}, background refresh {})",
            config.default_refresh_interval,
            config.background_refresh
        );
        Ok(Engine {
            analyzers: Arc::new(FieldAnalyzers::new()?),
            config,
            indices,
            clock,
            _scheduler: scheduler,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Index lifecycle

    pub fn create_index(&self, name: &str, request: CreateIndexRequest) -> Result<Acknowledged> {
        validate_index_name(name)?;
        let settings = request.settings.unwrap_or_else(|| self.config.index_defaults());
        match self.indices.entry(name.to_string()) {
            Entry::Occupied(_) => Err(QuarryError::index_already_exists(name)),
            Entry::Vacant(vacant) => {
                let metadata = IndexMetadata::new(name, settings, request.mapping);
                let index = Index::new(
                    metadata,
                    Arc::clone(&self.analyzers),
                    self.config.default_refresh_interval,
                    Arc::clone(&self.clock),
                );
                vacant.insert(Arc::new(index));
                tracing::info!("created index [{name}]");
                Ok(Acknowledged::new(name))
            }
        }
    }

    /// Create an index from an Elasticsearch-style body.
    pub fn create_index_from_json(&self, name: &str, body: &Value) -> Result<Acknowledged> {
        let request = CreateIndexRequest::from_json(body, self.config.index_defaults())?;
        self.create_index(name, request)
    }

    /// Delete an index with all its documents and pending writes.
    pub fn delete_index(&self, name: &str) -> Result<Acknowledged> {
        match self.indices.remove(name) {
            Some(_) => {
                tracing::info!("deleted index [{name}]");
                Ok(Acknowledged::new(name))
            }
            None => Err(QuarryError::index_not_found(name)),
        }
    }

    pub fn index_exists(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn get_index(&self, name: &str) -> Result<Arc<IndexMetadata>> {
        Ok(self.index_handle(name)?.metadata())
    }

    pub fn get_mapping(&self, name: &str) -> Result<Mapping> {
        Ok(self.index_handle(name)?.mapping())
    }

    pub fn get_settings(&self, name: &str) -> Result<IndexSettings> {
        Ok(self.index_handle(name)?.metadata().settings.clone())
    }

    /// Index names in ascending order.
    pub fn list_indices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indices.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    fn index_handle(&self, name: &str) -> Result<Arc<Index>> {
        self.indices
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| QuarryError::index_not_found(name))
    }

    /// The index a write goes to, created on demand when allowed.
    fn index_for_write(&self, name: &str) -> Result<Arc<Index>> {
        match self.index_handle(name) {
            Err(err) if err.is_not_found() && self.config.auto_create_index => {
                match self.create_index(name, CreateIndexRequest::new()) {
                    Ok(_) | Err(QuarryError::IndexAlreadyExists(_)) => self.index_handle(name),
                    Err(err) => Err(err),
                }
            }
            other => other,
        }
    }

    // Documents

    /// Create a document; fails with a version conflict if the id is live.
    pub fn create(&self, index: &str, id: Option<&str>, source: Source) -> Result<DocWriteResponse> {
        self.index_for_write(index)?.write(id, source, WriteMode::Create)
    }

    /// Create or replace a document.
    pub fn index(&self, index: &str, id: Option<&str>, source: Source) -> Result<DocWriteResponse> {
        self.index_for_write(index)?.write(id, source, WriteMode::Index)
    }

    /// Realtime get: sees every successful write, refreshed or not.
    pub fn get(&self, index: &str, id: &str) -> Result<GetResponse> {
        Ok(self.index_handle(index)?.get(id))
    }

    pub fn update(&self, index: &str, id: &str, request: &UpdateRequest) -> Result<DocWriteResponse> {
        self.index_for_write(index)?.update(id, request)
    }

    pub fn delete(&self, index: &str, id: &str) -> Result<DocWriteResponse> {
        self.index_handle(index)?.delete(id)
    }

    /// Apply a batch of writes in order. Items fail independently.
    pub fn bulk(&self, default_index: Option<&str>, request: BulkRequest) -> BulkResponse {
        let started = Instant::now();
        let mut items = Vec::with_capacity(request.len());
        for action in request.actions {
            let op = action.op();
            let index = action.index().or(default_index).map(str::to_string);
            let id = action.id().unwrap_or_default().to_string();
            let Some(index) = index else {
                let err = QuarryError::invalid_request("bulk item has no [_index] and no default index");
                tracing::warn!("bulk {} [{id}] failed: {err}", op.as_str());
                items.push(BulkItemResponse::failure(op, "", &id, &err));
                continue;
            };
            let outcome = match action {
                BulkAction::Index { id, source, .. } => self.index(&index, id.as_deref(), source),
                BulkAction::Create { id, source, .. } => self.create(&index, id.as_deref(), source),
                BulkAction::Update { id, request, .. } => self.update(&index, &id, &request),
                BulkAction::Delete { id, .. } => self.delete(&index, &id),
            };
            items.push(match outcome {
                Ok(response) => BulkItemResponse::success(op, response),
                Err(err) => {
                    tracing::warn!("bulk {} [{index}][{id}] failed: {err}", op.as_str());
                    BulkItemResponse::failure(op, &index, &id, &err)
                }
            });
        }
        let response = BulkResponse::new(started.elapsed(), items);
        tracing::debug!(
            "bulk of {} item(s) took {:?}, errors: {}",
            response.items.len(),
            response.took,
            response.errors
        );
        response
    }

    // Search

    fn resolve(&self, target: &SearchTarget) -> Result<Vec<Arc<Index>>> {
        match target {
            SearchTarget::All => Ok(self
                .list_indices()
                .iter()
                .filter_map(|name| self.index_handle(name).ok())
                .collect()),
            SearchTarget::Indices(names) => {
                let mut indices = names
                    .iter()
                    .map(|name| self.index_handle(name))
                    .collect::<Result<Vec<_>>>()?;
                // Searchers lock indices in name order, whatever order the target lists.
                indices.sort_by(|a, b| a.name().cmp(b.name()));
                indices.dedup_by(|a, b| a.name() == b.name());
                Ok(indices)
            }
        }
    }

    /// Resolve document references of `query` against the stores.
    fn rewrite_query(&self, query: &QueryNode, indices: &[Arc<Index>]) -> Result<QueryNode> {
        if !needs_rewrite(query) {
            return Ok(query.clone());
        }
        let current = match indices {
            [only] => Some(only.name()),
            _ => None,
        };
        rewrite(query, self, current)
    }

    /// Apply due writes, then run `f` over consistent views of `indices`.
    /// `indices` must come from `resolve`, which orders them by name.
    fn with_searcher<R>(
        &self,
        indices: &[Arc<Index>],
        f: impl FnOnce(&Searcher<'_>) -> Result<R>,
    ) -> Result<R> {
        for index in indices {
            index.refresh_due();
        }
        let metadata: Vec<Arc<IndexMetadata>> = indices.iter().map(|index| index.metadata()).collect();
        let states: Vec<_> = indices.iter().map(|index| index.searchable()).collect();
        let views = states
            .iter()
            .zip(&metadata)
            .map(|(state, metadata)| {
                IndexView::new(state, &metadata.mapping, metadata.settings.number_of_shards)
            })
            .collect();
        f(&Searcher::new(views, self.config.max_result_window))
    }

    pub fn search(&self, target: &SearchTarget, request: &SearchRequest) -> Result<SearchResponse> {
        let indices = self.resolve(target)?;
        let query = self.rewrite_query(&request.query, &indices)?;
        if query == request.query {
            return self.with_searcher(&indices, |searcher| searcher.search(request));
        }
        let request = SearchRequest {
            query,
            ..request.clone()
        };
        self.with_searcher(&indices, |searcher| searcher.search(&request))
    }

    /// Search with an Elasticsearch-style JSON body.
    pub fn search_json(&self, target: &SearchTarget, body: &Value) -> Result<SearchResponse> {
        let request = SearchRequest::from_json_with_defaults(
            body,
            self.config.default_search_size,
            self.config.default_terms_size,
        )?;
        self.search(target, &request)
    }

    /// Number of visible documents matching `query`.
    pub fn count(&self, target: &SearchTarget, query: &QueryNode) -> Result<usize> {
        let indices = self.resolve(target)?;
        let request = SearchRequest::new()
            .with_query(self.rewrite_query(query, &indices)?)
            .with_size(0);
        self.with_searcher(&indices, |searcher| searcher.count(&request))
    }

    /// Make every pending write of the target indices searchable now.
    /// Returns how many writes were applied.
    pub fn refresh(&self, target: &SearchTarget) -> Result<usize> {
        Ok(self.resolve(target)?.iter().map(|index| index.refresh()).sum())
    }

    pub fn stats(&self, index: &str) -> Result<IndexStats> {
        Ok(self.index_handle(index)?.stats())
    }

    /// Drop the tombstones of an index. Returns how many were purged.
    pub fn compact(&self, index: &str) -> Result<usize> {
        Ok(self.index_handle(index)?.compact())
    }
}

impl DocumentLookup for Engine {
    fn lookup(&self, index: &str, id: &str) -> Result<Option<Source>> {
        Ok(self.indices.get(index).and_then(|entry| entry.value().source(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use serde_json::json;

    fn engine() -> Engine {
        let config = EngineConfig::builder().background_refresh(false).build();
        Engine::with_clock(config, Arc::new(ManualClock::new())).unwrap()
    }

    fn source(value: Value) -> Source {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_index_lifecycle() {
        let engine = engine();
        let ack = engine.create_index("library", CreateIndexRequest::new()).unwrap();
        assert!(ack.acknowledged);
        assert!(engine.index_exists("library"));
        assert!(matches!(
            engine.create_index("library", CreateIndexRequest::new()),
            Err(QuarryError::IndexAlreadyExists(_))
        ));
        assert!(matches!(
            engine.create_index("Library", CreateIndexRequest::new()),
            Err(QuarryError::InvalidIndexName { .. })
        ));

        engine.delete_index("library").unwrap();
        assert!(!engine.index_exists("library"));
        assert!(engine.delete_index("library").unwrap_err().is_not_found());
        assert!(engine.get("library", "1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_index_from_json() {
        let engine = engine();
        engine
            .create_index_from_json(
                "library",
                &json!({
                    "settings": {"number_of_shards": 3, "refresh_interval": "-1"},
                    "mappings": {"book": {"properties": {"title": {"type": "text"}}}}
                }),
            )
            .unwrap();
        assert_eq!(engine.get_settings("library").unwrap().number_of_shards, 3);
        assert!(engine.get_mapping("library").unwrap().get("title").is_some());
        assert!(engine.create_index_from_json("x", &json!({"bogus": 1})).is_err());
    }

    #[test]
    fn test_auto_create_index() {
        let config = EngineConfig::builder()
            .background_refresh(false)
            .auto_create_index(true)
            .build();
        let engine = Engine::with_clock(config, Arc::new(ManualClock::new())).unwrap();
        engine.index("bank", Some("1"), source(json!({"n": 1}))).unwrap();
        assert_eq!(engine.list_indices(), vec!["bank".to_string()]);

        let strict = self::engine();
        assert!(strict.index("bank", Some("1"), source(json!({"n": 1}))).unwrap_err().is_not_found());
    }

    #[test]
    fn test_search_target_parse() {
        assert_eq!(SearchTarget::parse(""), SearchTarget::All);
        assert_eq!(SearchTarget::parse("_all"), SearchTarget::All);
        assert_eq!(
            SearchTarget::parse("bank, library"),
            SearchTarget::Indices(vec!["bank".into(), "library".into()])
        );
    }

    #[test]
    fn test_search_missing_index() {
        let engine = engine();
        let err = engine
            .search(&SearchTarget::index("nope"), &SearchRequest::new())
            .unwrap_err();
        assert!(err.is_not_found());
        let response = engine.search(&SearchTarget::All, &SearchRequest::new()).unwrap();
        assert_eq!(response.total, 0);
    }
}
