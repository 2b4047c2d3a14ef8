//! The document engine: index registry, write path and refresh pipeline.
//!
//! Writes are durable in an index's document store as soon as they return
//! and reach search once the index's refresh interval has elapsed (or on an
//! explicit [`Engine::refresh`]). Gets always read the store.

pub mod bulk;
pub mod clock;
pub mod config;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod index;
pub mod refresh;
pub mod responses;

pub use bulk::{BulkAction, BulkItemError, BulkItemResponse, BulkOp, BulkRequest, BulkResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{CreateIndexRequest, Engine, SearchTarget};
pub use index::{Index, WriteMode, validate_index_name};
pub use refresh::{PendingOp, RefreshQueue, RefreshScheduler};
pub use responses::{Acknowledged, DocWriteResponse, GetResponse, IndexStats, UpdateRequest, WriteResult};
