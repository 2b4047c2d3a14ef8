//! Per-index storage of geo values, keyed by field and document.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;

use crate::geo::point::GeoBoundingBox;
use crate::geo::relation::SpatialRelation;
use crate::geo::shape::GeoShape;
use crate::lexical::DocId;

#[derive(Debug, Clone)]
struct GeoEntry {
    shape: GeoShape,
    bbox: GeoBoundingBox,
}

/// Shapes of `geo_shape` and `geo_point` fields.
///
/// A document holding an array of shapes keeps one entry per element.
#[derive(Debug, Clone, Default)]
pub struct GeoIndex {
    fields: AHashMap<String, BTreeMap<DocId, Vec<GeoEntry>>>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shape for a document's field.
    pub fn index_shape(&mut self, field: &str, doc_id: DocId, shape: GeoShape) {
        let bbox = shape.bounding_box();
        self.fields
            .entry(field.to_string())
            .or_default()
            .entry(doc_id)
            .or_default()
            .push(GeoEntry { shape, bbox });
    }

    /// Drop every shape the document holds.
    pub fn remove_document(&mut self, doc_id: DocId) {
        self.fields.retain(|_, docs| {
            docs.remove(&doc_id);
            !docs.is_empty()
        });
    }

    /// The shapes a document holds in a field.
    pub fn shapes(&self, field: &str, doc_id: DocId) -> Vec<&GeoShape> {
        self.fields
            .get(field)
            .and_then(|docs| docs.get(&doc_id))
            .map(|entries| entries.iter().map(|e| &e.shape).collect())
            .unwrap_or_default()
    }

    /// Documents with a value in `field`.
    pub fn documents(&self, field: &str) -> BTreeSet<DocId> {
        self.fields
            .get(field)
            .map(|docs| docs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Documents whose stored shapes satisfy `relation` against `query`.
    ///
    /// With several shapes per document, `within` and `disjoint` must hold for
    /// all of them while `intersects` and `contains` need only one.
    pub fn match_relation(
        &self,
        field: &str,
        query: &GeoShape,
        relation: SpatialRelation,
    ) -> BTreeSet<DocId> {
        let Some(docs) = self.fields.get(field) else {
            return BTreeSet::new();
        };
        let query_bbox = query.bounding_box();

        docs.iter()
            .filter(|(_, entries)| {
                let check = |entry: &GeoEntry| match relation {
                    SpatialRelation::Disjoint if !entry.bbox.intersects(&query_bbox) => true,
                    SpatialRelation::Disjoint => relation.holds(&entry.shape, query),
                    _ if !entry.bbox.intersects(&query_bbox) => false,
                    _ => relation.holds(&entry.shape, query),
                };
                match relation {
                    SpatialRelation::Within | SpatialRelation::Disjoint => {
                        entries.iter().all(check)
                    }
                    SpatialRelation::Intersects | SpatialRelation::Contains => {
                        entries.iter().any(check)
                    }
                }
            })
            .map(|(doc_id, _)| *doc_id)
            .collect()
    }

    /// Documents with at least one shape accepted by `predicate`.
    pub fn filter_documents<F>(&self, field: &str, predicate: F) -> BTreeSet<DocId>
    where
        F: Fn(&GeoShape) -> bool,
    {
        self.fields
            .get(field)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, entries)| entries.iter().any(|e| predicate(&e.shape)))
                    .map(|(doc_id, _)| *doc_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of (field, document) pairs holding shapes.
    pub fn len(&self) -> usize {
        self.fields.values().map(|docs| docs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::point::GeoPoint;

    fn point(lon: f64, lat: f64) -> GeoShape {
        GeoShape::Point(GeoPoint::new(lat, lon).unwrap())
    }

    fn berlin_envelope() -> GeoShape {
        GeoShape::Envelope(GeoBoundingBox::from_corners(
            GeoPoint::new(53.0, 13.0).unwrap(),
            GeoPoint::new(52.0, 14.0).unwrap(),
        ))
    }

    #[test]
    fn test_match_within() {
        let mut index = GeoIndex::new();
        index.index_shape("location", 1, point(13.400544, 52.530286));
        index.index_shape("location", 2, point(15.0, 52.0));

        let hits = index.match_relation("location", &berlin_envelope(), SpatialRelation::Within);
        assert_eq!(hits, BTreeSet::from([1]));

        let hits = index.match_relation("location", &berlin_envelope(), SpatialRelation::Disjoint);
        assert_eq!(hits, BTreeSet::from([2]));

        assert!(
            index
                .match_relation("missing", &berlin_envelope(), SpatialRelation::Within)
                .is_empty()
        );
    }

    #[test]
    fn test_multi_valued_within_needs_all() {
        let mut index = GeoIndex::new();
        index.index_shape("stops", 7, point(13.5, 52.5));
        index.index_shape("stops", 7, point(15.0, 52.0));

        let envelope = berlin_envelope();
        assert!(
            index
                .match_relation("stops", &envelope, SpatialRelation::Within)
                .is_empty()
        );
        assert_eq!(
            index.match_relation("stops", &envelope, SpatialRelation::Intersects),
            BTreeSet::from([7])
        );
    }

    #[test]
    fn test_remove_document() {
        let mut index = GeoIndex::new();
        index.index_shape("location", 1, point(13.4, 52.5));
        index.index_shape("area", 1, berlin_envelope());
        assert_eq!(index.len(), 2);

        index.remove_document(1);
        assert!(index.is_empty());
        assert!(index.shapes("location", 1).is_empty());
    }
}
