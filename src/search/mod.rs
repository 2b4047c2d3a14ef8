//! Search execution: refreshed index state, requests, sorting and responses.

pub mod request;
pub mod response;
pub mod searchable;
pub mod searcher;
pub mod sort;

pub use request::SearchRequest;
pub use response::{SearchHit, SearchResponse};
pub use searchable::{LiveDocument, SearchableState};
pub use searcher::{IndexView, Searcher};
pub use sort::{SortField, SortOrder, compare_keys, sort_key};
