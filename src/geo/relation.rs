//! Spatial relations between a stored shape and a query shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuarryError;
use crate::geo::shape::{GeoShape, segments_intersect};

/// How a stored shape must relate to the query shape to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialRelation {
    /// The shapes share at least one point.
    #[default]
    Intersects,
    /// The shapes share no point.
    Disjoint,
    /// Every representative point of the stored shape lies inside the query shape.
    Within,
    /// Every representative point of the query shape lies inside the stored shape.
    Contains,
}

impl SpatialRelation {
    /// Evaluate the relation for one stored shape.
    pub fn holds(&self, stored: &GeoShape, query: &GeoShape) -> bool {
        match self {
            SpatialRelation::Intersects => intersects(stored, query),
            SpatialRelation::Disjoint => !intersects(stored, query),
            SpatialRelation::Within => covers_all(query, stored),
            SpatialRelation::Contains => covers_all(stored, query),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpatialRelation::Intersects => "intersects",
            SpatialRelation::Disjoint => "disjoint",
            SpatialRelation::Within => "within",
            SpatialRelation::Contains => "contains",
        }
    }
}

impl FromStr for SpatialRelation {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intersects" => Ok(SpatialRelation::Intersects),
            "disjoint" => Ok(SpatialRelation::Disjoint),
            "within" => Ok(SpatialRelation::Within),
            "contains" => Ok(SpatialRelation::Contains),
            other => Err(QuarryError::invalid_query(format!(
                "unknown spatial relation [{other}]"
            ))),
        }
    }
}

impl fmt::Display for SpatialRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether every representative point of `inner` lies on or inside `outer`.
fn covers_all(outer: &GeoShape, inner: &GeoShape) -> bool {
    if !outer.bounding_box().intersects(&inner.bounding_box()) {
        return false;
    }
    inner
        .representative_points()
        .iter()
        .all(|point| outer.covers_point(point))
}

fn intersects(a: &GeoShape, b: &GeoShape) -> bool {
    if !a.bounding_box().intersects(&b.bounding_box()) {
        return false;
    }
    if a.representative_points().iter().any(|p| b.covers_point(p))
        || b.representative_points().iter().any(|p| a.covers_point(p))
    {
        return true;
    }
    let b_edges = b.edges();
    a.edges()
        .into_iter()
        .any(|ea| b_edges.iter().any(|eb| segments_intersect(ea, *eb)))
}
