//! Geospatial types and the per-index geo index.
//!
//! Coordinates follow GeoJSON order (`[lon, lat]`) wherever arrays are
//! accepted; [`GeoPoint`] itself always stores `lat` and `lon` by name.

pub mod index;
pub mod point;
pub mod relation;
pub mod shape;

pub use index::GeoIndex;
pub use point::{GeoBoundingBox, GeoPoint, parse_distance};
pub use relation::SpatialRelation;
pub use shape::GeoShape;
