//! Term extraction from stored percolator queries.
//!
//! A query that can only match documents containing at least one of a known
//! set of `(field, term)` pairs is indexed under those pairs. Percolation
//! then verifies just the queries whose terms occur in the candidate
//! documents, plus the ones no terms could be extracted from.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::analysis::FieldAnalyzers;
use crate::query::QueryNode;
use crate::query::query_string::ALL_FIELDS;
use crate::schema::{FieldType, Mapping};

/// What registration learned about a stored query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Every match contains at least one of these `(field, term)` pairs.
    /// An empty set means the query never matches.
    Terms(BTreeSet<(String, String)>),
    /// No usable terms; the query is verified against every candidate.
    VerifyAlways,
}

impl Extraction {
    pub fn is_verify_always(&self) -> bool {
        matches!(self, Extraction::VerifyAlways)
    }
}

/// Extract the term signature of a query.
pub fn extract(query: &QueryNode, mapping: &Mapping, analyzers: &FieldAnalyzers) -> Extraction {
    match query {
        QueryNode::MatchNone => Extraction::Terms(BTreeSet::new()),
        QueryNode::Match { field, query, .. } => {
            analyzed_terms(field, std::slice::from_ref(query), mapping, analyzers)
        }
        QueryNode::Term { field, value } => exact_terms(field, std::slice::from_ref(value), mapping),
        QueryNode::Terms { field, values } => exact_terms(field, values, mapping),
        QueryNode::Bool(bool_query) => {
            let mut best: Option<BTreeSet<(String, String)>> = None;
            for clause in bool_query.required() {
                if let Extraction::Terms(terms) = extract(clause, mapping, analyzers) {
                    if best.as_ref().is_none_or(|b| terms.len() < b.len()) {
                        best = Some(terms);
                    }
                }
            }
            if let Some(terms) = best {
                return Extraction::Terms(terms);
            }
            if bool_query.should.is_empty() || bool_query.required_should_matches() == 0 {
                return Extraction::VerifyAlways;
            }
            let mut union = BTreeSet::new();
            for clause in &bool_query.should {
                match extract(clause, mapping, analyzers) {
                    Extraction::Terms(terms) => union.extend(terms),
                    Extraction::VerifyAlways => return Extraction::VerifyAlways,
                }
            }
            Extraction::Terms(union)
        }
        _ => Extraction::VerifyAlways,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn analyzed_terms(
    field: &str,
    values: &[Value],
    mapping: &Mapping,
    analyzers: &FieldAnalyzers,
) -> Extraction {
    if field == ALL_FIELDS {
        return Extraction::VerifyAlways;
    }
    let Some(field_type) = mapping.resolve(field) else {
        return Extraction::VerifyAlways;
    };
    let Some(analyzer) = analyzers.for_type(field_type) else {
        return Extraction::VerifyAlways;
    };
    let mut terms = BTreeSet::new();
    for value in values {
        match analyzer.terms(&value_text(value)) {
            Ok(analyzed) => terms.extend(analyzed.into_iter().map(|t| (field.to_string(), t))),
            Err(_) => return Extraction::VerifyAlways,
        }
    }
    Extraction::Terms(terms)
}

fn exact_terms(field: &str, values: &[Value], mapping: &Mapping) -> Extraction {
    match mapping.resolve(field) {
        Some(FieldType::Text | FieldType::Keyword) => Extraction::Terms(
            values
                .iter()
                .map(|v| (field.to_string(), value_text(v)))
                .collect(),
        ),
        _ => Extraction::VerifyAlways,
    }
}
