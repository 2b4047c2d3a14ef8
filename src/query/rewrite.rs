//! Resolution of document references inside a query tree.
//!
//! `percolate` by id, `more_like_this` like items naming stored documents and
//! `geo_shape` with `indexed_shape` all point at other documents. They are
//! replaced by inline data before evaluation, so evaluating a query never
//! needs to reach into another index.

use serde_json::Value;

use crate::document::Source;
use crate::error::{QuarryError, Result};
use crate::geo::GeoShape;
use crate::query::dsl::{BoolQuery, LikeItem, PercolateSource, QueryNode, ShapeSource};

/// Index that `indexed_shape` lookups use when none is given.
pub const DEFAULT_SHAPE_INDEX: &str = "shapes";

/// Realtime access to stored document sources.
pub trait DocumentLookup {
    /// The live source of a document, `None` when the index or the document
    /// does not exist.
    fn lookup(&self, index: &str, id: &str) -> Result<Option<Source>>;
}

/// Resolve every document reference in `node`.
///
/// `current_index` is used for references that omit their index; it is
/// `None` when a search spans several indices.
pub fn rewrite(
    node: &QueryNode,
    lookup: &dyn DocumentLookup,
    current_index: Option<&str>,
) -> Result<QueryNode> {
    let rewriter = Rewriter {
        lookup,
        current_index,
    };
    rewriter.rewrite(node)
}

/// Whether `node` holds references that [`rewrite`] must resolve.
pub fn needs_rewrite(node: &QueryNode) -> bool {
    match node {
        QueryNode::Percolate {
            source: PercolateSource::Stored { .. },
            ..
        } => true,
        QueryNode::GeoShape {
            shape: ShapeSource::Indexed { .. },
            ..
        } => true,
        QueryNode::MoreLikeThis(mlt) => mlt
            .like
            .iter()
            .any(|item| matches!(item, LikeItem::Document { .. })),
        QueryNode::Bool(b) => b
            .must
            .iter()
            .chain(&b.filter)
            .chain(&b.should)
            .chain(&b.must_not)
            .any(needs_rewrite),
        _ => false,
    }
}

struct Rewriter<'a> {
    lookup: &'a dyn DocumentLookup,
    current_index: Option<&'a str>,
}

impl Rewriter<'_> {
    fn rewrite(&self, node: &QueryNode) -> Result<QueryNode> {
        match node {
            QueryNode::Bool(b) => Ok(QueryNode::Bool(BoolQuery {
                must: self.rewrite_all(&b.must)?,
                filter: self.rewrite_all(&b.filter)?,
                should: self.rewrite_all(&b.should)?,
                must_not: self.rewrite_all(&b.must_not)?,
                minimum_should_match: b.minimum_should_match,
            })),
            QueryNode::Percolate {
                field,
                source: PercolateSource::Stored { index, id },
            } => {
                let index = self.index_for(index.as_deref(), "percolate")?;
                let source = self
                    .lookup
                    .lookup(index, id)?
                    .ok_or_else(|| QuarryError::document_not_found(index, id.as_str()))?;
                tracing::debug!("percolating stored document [{index}][{id}]");
                Ok(QueryNode::Percolate {
                    field: field.clone(),
                    source: PercolateSource::Documents(vec![source]),
                })
            }
            QueryNode::GeoShape {
                field,
                shape: ShapeSource::Indexed { index, id, path },
                relation,
            } => {
                let index = index.as_deref().unwrap_or(DEFAULT_SHAPE_INDEX);
                let source = self
                    .lookup
                    .lookup(index, id)?
                    .ok_or_else(|| QuarryError::document_not_found(index, id.as_str()))?;
                let raw = source_path(&source, path).ok_or_else(|| {
                    QuarryError::invalid_query(format!(
                        "shape [{id}] in index [{index}] has no field [{path}]"
                    ))
                })?;
                let shape = GeoShape::from_json(raw)
                    .map_err(|e| QuarryError::invalid_query(e.to_string()))?;
                Ok(QueryNode::GeoShape {
                    field: field.clone(),
                    shape: ShapeSource::Inline(shape),
                    relation: *relation,
                })
            }
            QueryNode::MoreLikeThis(mlt) => {
                let mut resolved = mlt.clone();
                resolved.like.clear();
                for item in &mlt.like {
                    let LikeItem::Document { index, id } = item else {
                        resolved.like.push(item.clone());
                        continue;
                    };
                    let index = self.index_for(index.as_deref(), "more_like_this")?;
                    match self.lookup.lookup(index, id)? {
                        Some(source) => resolved.like.push(LikeItem::Inline(source)),
                        None => tracing::debug!("like document [{index}][{id}] not found"),
                    }
                    if !mlt.include {
                        resolved.exclude.push((index.to_string(), id.clone()));
                    }
                }
                Ok(QueryNode::MoreLikeThis(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn rewrite_all(&self, nodes: &[QueryNode]) -> Result<Vec<QueryNode>> {
        nodes.iter().map(|node| self.rewrite(node)).collect()
    }

    fn index_for<'a>(&'a self, index: Option<&'a str>, query: &str) -> Result<&'a str> {
        index.or(self.current_index).ok_or_else(|| {
            QuarryError::invalid_query(format!(
                "[{query}] document reference requires an [index] when searching several indices"
            ))
        })
    }
}

/// Follow a dotted path into a source.
pub(crate) fn source_path<'a>(source: &'a Source, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = source.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::SpatialRelation;
    use crate::query::dsl::MoreLikeThisQuery;
    use serde_json::json;
    use std::collections::HashMap;

    struct Fixture(HashMap<(String, String), Source>);

    impl Fixture {
        fn new() -> Self {
            let mut docs = HashMap::new();
            docs.insert(
                ("library".to_string(), "1".to_string()),
                json!({"title": "Thinking Fast"}).as_object().cloned().unwrap(),
            );
            docs.insert(
                ("shapes".to_string(), "berlin".to_string()),
                json!({"area": {"shape": {"type": "envelope", "coordinates": [[13.0, 53.0], [14.0, 52.0]]}}})
                    .as_object()
                    .cloned()
                    .unwrap(),
            );
            Fixture(docs)
        }
    }

    impl DocumentLookup for Fixture {
        fn lookup(&self, index: &str, id: &str) -> Result<Option<Source>> {
            Ok(self.0.get(&(index.to_string(), id.to_string())).cloned())
        }
    }

    #[test]
    fn test_percolate_by_id() {
        let node = QueryNode::Percolate {
            field: "query".into(),
            source: PercolateSource::Stored {
                index: None,
                id: "1".into(),
            },
        };
        assert!(needs_rewrite(&node));

        let rewritten = rewrite(&node, &Fixture::new(), Some("library")).unwrap();
        let QueryNode::Percolate { source: PercolateSource::Documents(docs), .. } = &rewritten else {
            panic!("expected inline documents");
        };
        assert_eq!(docs[0]["title"], "Thinking Fast");
        assert!(!needs_rewrite(&rewritten));

        let missing = QueryNode::Percolate {
            field: "query".into(),
            source: PercolateSource::Stored {
                index: Some("library".into()),
                id: "9".into(),
            },
        };
        assert!(rewrite(&missing, &Fixture::new(), None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_indexed_shape() {
        let node = QueryNode::GeoShape {
            field: "location".into(),
            shape: ShapeSource::Indexed {
                index: None,
                id: "berlin".into(),
                path: "area.shape".into(),
            },
            relation: SpatialRelation::Within,
        };
        let rewritten = rewrite(&node, &Fixture::new(), None).unwrap();
        assert!(matches!(
            rewritten,
            QueryNode::GeoShape {
                shape: ShapeSource::Inline(GeoShape::Envelope(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_more_like_this_documents_are_excluded() {
        let mlt = MoreLikeThisQuery::new(
            vec!["title".into()],
            vec![
                LikeItem::Text("big".into()),
                LikeItem::Document {
                    index: None,
                    id: "1".into(),
                },
            ],
        );
        let node = QueryNode::Bool(BoolQuery::new().must(QueryNode::MoreLikeThis(mlt)));
        let rewritten = rewrite(&node, &Fixture::new(), Some("library")).unwrap();

        let QueryNode::Bool(b) = rewritten else {
            panic!("expected bool");
        };
        let QueryNode::MoreLikeThis(resolved) = &b.must[0] else {
            panic!("expected more_like_this");
        };
        assert!(matches!(resolved.like[1], LikeItem::Inline(_)));
        assert_eq!(resolved.exclude, vec![("library".to_string(), "1".to_string())]);

        let err = rewrite(
            &QueryNode::MoreLikeThis(MoreLikeThisQuery::new(
                vec![],
                vec![LikeItem::Document {
                    index: None,
                    id: "1".into(),
                }],
            )),
            &Fixture::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, QuarryError::InvalidQuery(_)));
    }
}
