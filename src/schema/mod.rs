//! Index schema: field types, mappings, settings and metadata.
//!
//! A [`Mapping`] fixes the type of every known field path. Types decide how
//! values are coerced, which analyzer (if any) produces terms, and which
//! auxiliary structure (doc values, geo index, percolator) receives them.

pub mod field;
pub mod mapping;
pub mod metadata;
pub mod settings;

pub use field::{FieldMapping, FieldType};
pub use mapping::{Dynamic, Mapping};
pub use metadata::IndexMetadata;
pub use settings::{IndexSettings, RefreshInterval, parse_time_value};
