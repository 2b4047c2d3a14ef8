//! Query evaluation against one index's searchable state.
//!
//! Each node evaluates to the set of matching document ids; compound nodes
//! combine their children's sets. Evaluation only reads the state it is
//! given, so a query must be rewritten (see [`crate::query::rewrite`])
//! before it gets here.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::document::{FieldValue, Source, parser::coerce};
use crate::error::{QuarryError, Result};
use crate::geo::GeoShape;
use crate::lexical::DocId;
use crate::query::dsl::{
    BoolQuery, Bound, LikeItem, MoreLikeThisQuery, Operator, PercolateSource, QueryNode,
    RangeQuery, ShapeSource,
};
use crate::query::query_string::ALL_FIELDS;
use crate::query::rewrite::source_path;
use crate::query::script::{Script, ScriptContext};
use crate::schema::{FieldType, Mapping};
use crate::search::SearchableState;

/// Evaluates query trees over a [`SearchableState`].
///
/// Percolate nodes also record which candidate documents (1-based slots)
/// each matching stored query matched; collect them with
/// [`Evaluator::into_slots`].
pub struct Evaluator<'a> {
    state: &'a SearchableState,
    mapping: &'a Mapping,
    slots: RefCell<BTreeMap<DocId, Vec<usize>>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(state: &'a SearchableState, mapping: &'a Mapping) -> Self {
        Evaluator {
            state,
            mapping,
            slots: RefCell::new(BTreeMap::new()),
        }
    }

    /// Percolator slots recorded while evaluating.
    pub fn into_slots(self) -> BTreeMap<DocId, Vec<usize>> {
        self.slots.into_inner()
    }

    /// The ids of every document matching `node`.
    pub fn evaluate(&self, node: &QueryNode) -> Result<BTreeSet<DocId>> {
        match node {
            QueryNode::MatchAll => Ok(self.state.doc_ids()),
            QueryNode::MatchNone => Ok(BTreeSet::new()),
            QueryNode::Match {
                field,
                query,
                operator,
            } => self.match_query(field, query, *operator),
            QueryNode::Term { field, value } => self.term_query(field, value),
            QueryNode::Terms { field, values } => {
                let mut result = BTreeSet::new();
                for value in values {
                    result.extend(self.term_query(field, value)?);
                }
                Ok(result)
            }
            QueryNode::Ids(ids) => Ok(ids.iter().filter_map(|id| self.state.doc_id(id)).collect()),
            QueryNode::Exists { field } => Ok(self.exists(field)),
            QueryNode::Bool(bool_query) => self.bool_query(bool_query),
            QueryNode::Range(range) => self.range_query(range),
            QueryNode::GeoShape {
                field,
                shape,
                relation,
            } => {
                let ShapeSource::Inline(shape) = shape else {
                    return Err(QuarryError::invalid_query(
                        "[geo_shape] indexed shape was not resolved",
                    ));
                };
                if !self.require_geo(field)? {
                    return Ok(BTreeSet::new());
                }
                Ok(self.state.geo().match_relation(field, shape, *relation))
            }
            QueryNode::GeoDistance {
                field,
                center,
                distance,
            } => {
                if !self.require_geo(field)? {
                    return Ok(BTreeSet::new());
                }
                Ok(self.state.geo().filter_documents(field, |shape| {
                    shape
                        .representative_points()
                        .iter()
                        .any(|point| point.distance_to(center) <= *distance)
                }))
            }
            QueryNode::GeoBoundingBox { field, bbox } => {
                if !self.require_geo(field)? {
                    return Ok(BTreeSet::new());
                }
                Ok(self.state.geo().filter_documents(field, |shape| match shape {
                    GeoShape::Point(point) => bbox.contains(point),
                    other => other.bounding_box().intersects(bbox),
                }))
            }
            QueryNode::Percolate { field, source } => {
                let PercolateSource::Documents(documents) = source else {
                    return Err(QuarryError::invalid_query(
                        "[percolate] stored document was not resolved",
                    ));
                };
                self.percolate(field, documents)
            }
            QueryNode::MoreLikeThis(mlt) => self.more_like_this(mlt),
            QueryNode::Script(script) => Ok(self.script(script)),
        }
    }

    fn text_of(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn match_query(&self, field: &str, query: &Value, operator: Operator) -> Result<BTreeSet<DocId>> {
        if field == ALL_FIELDS {
            let mut result = BTreeSet::new();
            for (path, field_type) in self.mapping.searchable_fields() {
                if matches!(field_type, FieldType::Text | FieldType::Keyword) {
                    result.extend(self.match_query(&path, query, operator)?);
                }
            }
            return Ok(result);
        }

        let Some(field_type) = self.mapping.resolve(field) else {
            return Ok(BTreeSet::new());
        };
        match field_type {
            FieldType::Text => {
                let terms = self.state.analyzers().text().terms(&Self::text_of(query))?;
                let inverted = self.state.inverted();
                let mut sets = terms.iter().map(|term| inverted.docs_with_term(field, term));
                let Some(first) = sets.next() else {
                    return Ok(BTreeSet::new());
                };
                Ok(match operator {
                    Operator::Or => sets.fold(first, |acc, set| &acc | &set),
                    Operator::And => sets.fold(first, |acc, set| &acc & &set),
                })
            }
            _ => self.term_query(field, query),
        }
    }

    /// Exact value match: no analysis on text and keyword fields, coercion
    /// on numeric and boolean fields.
    fn term_query(&self, field: &str, value: &Value) -> Result<BTreeSet<DocId>> {
        let Some(field_type) = self.mapping.resolve(field) else {
            return Ok(BTreeSet::new());
        };
        match field_type {
            FieldType::Text | FieldType::Keyword => Ok(self
                .state
                .inverted()
                .docs_with_term(field, &Self::text_of(value))),
            FieldType::Integer | FieldType::Float | FieldType::Boolean => {
                let target = coerce(field, field_type, value).map_err(|_| {
                    QuarryError::invalid_query(format!(
                        "failed to create query: [{value}] is not a valid [{field_type}] value for field [{field}]"
                    ))
                })?;
                Ok(self.state.doc_values().filter_documents(field, |v| {
                    v.total_cmp(&target) == std::cmp::Ordering::Equal
                }))
            }
            other => Err(QuarryError::invalid_query(format!(
                "field [{field}] of type [{other}] does not support term queries"
            ))),
        }
    }

    fn exists(&self, field: &str) -> BTreeSet<DocId> {
        let mut result = self.state.doc_values().documents_with(field);
        if self.mapping.is_object(field) {
            let prefix = format!("{field}.");
            for (path, _) in self.mapping.searchable_fields() {
                if path.starts_with(&prefix) {
                    result.extend(self.state.doc_values().documents_with(&path));
                }
            }
        }
        result
    }

    fn bool_query(&self, query: &BoolQuery) -> Result<BTreeSet<DocId>> {
        let mut result: Option<BTreeSet<DocId>> = None;
        for clause in query.required() {
            let matched = self.evaluate(clause)?;
            result = Some(match result {
                Some(acc) => &acc & &matched,
                None => matched,
            });
            if result.as_ref().is_some_and(BTreeSet::is_empty) {
                return Ok(BTreeSet::new());
            }
        }

        let required_should = query.required_should_matches();
        if required_should > 0 {
            let mut counts: BTreeMap<DocId, usize> = BTreeMap::new();
            for clause in &query.should {
                for doc_id in self.evaluate(clause)? {
                    *counts.entry(doc_id).or_default() += 1;
                }
            }
            let matched: BTreeSet<DocId> = counts
                .into_iter()
                .filter(|(_, count)| *count >= required_should)
                .map(|(doc_id, _)| doc_id)
                .collect();
            result = Some(match result {
                Some(acc) => &acc & &matched,
                None => matched,
            });
        } else {
            // Optional should clauses still have to be valid queries.
            for clause in &query.should {
                self.evaluate(clause)?;
            }
        }

        let mut result = result.unwrap_or_else(|| self.state.doc_ids());
        for clause in &query.must_not {
            if result.is_empty() {
                break;
            }
            let excluded = self.evaluate(clause)?;
            result.retain(|doc_id| !excluded.contains(doc_id));
        }
        Ok(result)
    }

    fn range_query(&self, range: &RangeQuery) -> Result<BTreeSet<DocId>> {
        let field = range.field.as_str();
        let Some(field_type) = self.mapping.resolve(field) else {
            return Ok(BTreeSet::new());
        };
        let doc_values = self.state.doc_values();

        match field_type {
            FieldType::Integer | FieldType::Float => {
                let to_f64 = |v: &Value| {
                    coerce(field, FieldType::Float, v)
                        .ok()
                        .and_then(|v| v.as_f64())
                        .ok_or_else(|| {
                            QuarryError::invalid_query(format!(
                                "failed to create query: [{v}] is not a number for field [{field}]"
                            ))
                        })
                };
                let lower = range.lower.try_map(to_f64)?;
                let upper = range.upper.try_map(to_f64)?;
                Ok(doc_values.filter_documents(field, |v| {
                    v.as_f64()
                        .is_some_and(|x| lower.contains_lower(&x) && upper.contains_upper(&x))
                }))
            }
            FieldType::Boolean => {
                let to_bool = |v: &Value| {
                    coerce(field, FieldType::Boolean, v)
                        .ok()
                        .and_then(|v| v.as_boolean())
                        .ok_or_else(|| {
                            QuarryError::invalid_query(format!(
                                "failed to create query: [{v}] is not a boolean for field [{field}]"
                            ))
                        })
                };
                let lower = range.lower.try_map(to_bool)?;
                let upper = range.upper.try_map(to_bool)?;
                Ok(doc_values.filter_documents(field, |v| {
                    v.as_boolean()
                        .is_some_and(|b| lower.contains_lower(&b) && upper.contains_upper(&b))
                }))
            }
            FieldType::Keyword => {
                let (lower, upper) = Self::string_bounds(range)?;
                Ok(doc_values.filter_documents(field, |v| {
                    v.as_text().is_some_and(|s| {
                        let s = s.to_string();
                        lower.contains_lower(&s) && upper.contains_upper(&s)
                    })
                }))
            }
            FieldType::Text => {
                let (lower, upper) = Self::string_bounds(range)?;
                let inverted = self.state.inverted();
                let mut result = BTreeSet::new();
                for term in inverted.terms(field) {
                    if lower.contains_lower(term) && upper.contains_upper(term) {
                        result.extend(inverted.docs_with_term(field, term));
                    }
                }
                Ok(result)
            }
            other => Err(QuarryError::invalid_query(format!(
                "field [{field}] of type [{other}] does not support range queries"
            ))),
        }
    }

    fn string_bounds(range: &RangeQuery) -> Result<(Bound<String>, Bound<String>)> {
        let to_string = |v: &Value| Ok(Self::text_of(v));
        Ok((range.lower.try_map(to_string)?, range.upper.try_map(to_string)?))
    }

    /// `Ok(false)` for unmapped fields, an error for non-geo fields.
    fn require_geo(&self, field: &str) -> Result<bool> {
        match self.mapping.resolve(field) {
            None => Ok(false),
            Some(field_type) if field_type.is_geo() => Ok(true),
            Some(other) => Err(QuarryError::invalid_query(format!(
                "field [{field}] is of type [{other}], but a geo field is required"
            ))),
        }
    }

    fn percolate(&self, field: &str, documents: &[Source]) -> Result<BTreeSet<DocId>> {
        match self.mapping.resolve(field) {
            None => Ok(BTreeSet::new()),
            Some(FieldType::Percolator) => {
                let matches = self.state.percolator().percolate(
                    field,
                    documents,
                    self.mapping,
                    self.state.analyzers(),
                )?;
                let mut slots = self.slots.borrow_mut();
                for (doc_id, doc_slots) in &matches {
                    let entry = slots.entry(*doc_id).or_default();
                    entry.extend(doc_slots.iter().copied());
                    entry.sort_unstable();
                    entry.dedup();
                }
                Ok(matches.into_keys().collect())
            }
            Some(other) => Err(QuarryError::invalid_query(format!(
                "field [{field}] is of type [{other}], but service requires a [percolator] field"
            ))),
        }
    }

    fn more_like_this(&self, mlt: &MoreLikeThisQuery) -> Result<BTreeSet<DocId>> {
        let fields: Vec<(String, FieldType)> = if mlt.fields.is_empty() {
            self.mapping
                .searchable_fields()
                .into_iter()
                .filter(|(_, ty)| *ty == FieldType::Text)
                .collect()
        } else {
            mlt.fields
                .iter()
                .filter_map(|f| {
                    self.mapping
                        .resolve(f)
                        .filter(|ty| matches!(ty, FieldType::Text | FieldType::Keyword))
                        .map(|ty| (f.clone(), ty))
                })
                .collect()
        };

        // How often each (field, term) occurs across the like items.
        let mut like_terms: BTreeMap<(String, String), u32> = BTreeMap::new();
        for (field, field_type) in &fields {
            let Some(analyzer) = self.state.analyzers().for_type(*field_type) else {
                continue;
            };
            for item in &mlt.like {
                let texts = match item {
                    LikeItem::Text(text) => vec![text.clone()],
                    LikeItem::Inline(source) => source_texts(source, field),
                    LikeItem::Document { .. } => {
                        return Err(QuarryError::invalid_query(
                            "[more_like_this] like document was not resolved",
                        ));
                    }
                };
                for text in texts {
                    for term in analyzer.terms(&text)? {
                        *like_terms.entry((field.clone(), term)).or_default() += 1;
                    }
                }
            }
        }

        let mut ranked: Vec<((String, String), u32)> = like_terms.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(mlt.max_query_terms);

        let inverted = self.state.inverted();
        let mut result = BTreeSet::new();
        for ((field, term), _) in &ranked {
            let Some(postings) = inverted.postings_for(field, term) else {
                continue;
            };
            if postings.doc_frequency() < mlt.min_doc_freq as usize {
                continue;
            }
            result.extend(
                postings
                    .iter()
                    .filter(|posting| posting.frequency >= mlt.min_term_freq)
                    .map(|posting| posting.doc_id),
            );
        }

        for (index, id) in &mlt.exclude {
            if index == self.state.index_name() {
                if let Some(doc_id) = self.state.doc_id(id) {
                    result.remove(&doc_id);
                }
            }
        }
        Ok(result)
    }

    fn script(&self, script: &Script) -> BTreeSet<DocId> {
        self.state
            .doc_ids()
            .into_iter()
            .filter(|doc_id| {
                let ctx = DocScriptContext {
                    evaluator: self,
                    doc_id: *doc_id,
                };
                match script.matches(&ctx) {
                    Ok(matched) => matched,
                    Err(err) => {
                        tracing::debug!("script [{}] excluded document: {err}", script.source);
                        false
                    }
                }
            })
            .collect()
    }
}

struct DocScriptContext<'e, 'a> {
    evaluator: &'e Evaluator<'a>,
    doc_id: DocId,
}

impl ScriptContext for DocScriptContext<'_, '_> {
    fn doc_values(&self, field: &str) -> Result<&[FieldValue]> {
        let evaluator = self.evaluator;
        match evaluator.mapping.resolve(field) {
            None => Err(QuarryError::evaluation(format!(
                "No field found for [{field}] in mapping"
            ))),
            Some(FieldType::Text) => Err(QuarryError::evaluation(format!(
                "Fielddata is disabled on text fields by default, set fielddata=true on [{field}]"
            ))),
            Some(field_type) if !field_type.has_doc_values() => Err(QuarryError::evaluation(
                format!("field [{field}] of type [{field_type}] has no doc values"),
            )),
            Some(_) => Ok(evaluator.state.doc_values().values(field, self.doc_id)),
        }
    }
}

/// Text values at `path` in a raw source, falling back to the parent path
/// for multi-fields such as `state.keyword`.
fn source_texts(source: &Source, path: &str) -> Vec<String> {
    let value = source_path(source, path).or_else(|| {
        let (parent, _) = path.rsplit_once('.')?;
        source_path(source, parent)
    });
    let mut texts = Vec::new();
    if let Some(value) = value {
        collect_texts(value, &mut texts);
    }
    texts
}

fn collect_texts(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_texts(item, out)),
        Value::Null | Value::Object(_) => {}
    }
}
