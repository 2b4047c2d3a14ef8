//! # Quarry
//!
//! An in-memory document search engine with an Elasticsearch-style API.
//!
//! ## Features
//!
//! - Named indices with mappings, dynamic field detection and settings
//! - Document create, index, get, update, delete and bulk with versioning
//! - Near-real-time search: writes become searchable after a refresh interval
//! - `match`, `bool`, `range`, `geo_shape`, `more_like_this`, `script` and
//!   `percolate` queries plus the query-string syntax
//! - Sorting, paging and `terms` aggregations with error bounds
//! - A percolator that matches documents against stored queries
//!
//! ## Example
//!
//! ```
//! use quarry::engine::{CreateIndexRequest, Engine, EngineConfig, SearchTarget};
//! use quarry::search::SearchRequest;
//! use serde_json::json;
//!
//! let config = EngineConfig::builder().background_refresh(false).build();
//! let engine = Engine::with_config(config).unwrap();
//! engine.create_index("library", CreateIndexRequest::new()).unwrap();
//!
//! let book = json!({"title": "Thinking, Fast and Slow"});
//! engine.index("library", Some("1"), book.as_object().cloned().unwrap()).unwrap();
//! engine.refresh(&SearchTarget::index("library")).unwrap();
//!
//! let request = SearchRequest::new().with_q("title:thinking").unwrap();
//! let response = engine.search(&SearchTarget::index("library"), &request).unwrap();
//! assert_eq!(response.ids(), vec!["1"]);
//! ```

pub mod aggregation;
pub mod analysis;
pub mod cli;
pub mod document;
pub mod engine;
pub mod error;
pub mod geo;
pub mod lexical;
pub mod percolator;
pub mod query;
pub mod schema;
pub mod search;
pub mod store;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
