//! Column-oriented field values for sorting, ranges, scripts and aggregations.
//!
//! Unlike the stored source (row-oriented), doc values keep all values of
//! one field together, already coerced to the field type. Only keyword,
//! numeric and boolean fields have doc values; `text` fields do not, which
//! is why scripts and aggregations on them fail or come back empty.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;

use crate::document::FieldValue;
use crate::lexical::DocId;

/// Per-field columns plus a presence set for every field path.
#[derive(Debug, Clone, Default)]
pub struct DocValues {
    columns: AHashMap<String, BTreeMap<DocId, Vec<FieldValue>>>,
    presence: AHashMap<String, BTreeSet<DocId>>,
}

impl DocValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to a document's column entry.
    pub fn add_value(&mut self, field: &str, doc_id: DocId, value: FieldValue) {
        self.columns
            .entry(field.to_string())
            .or_default()
            .entry(doc_id)
            .or_default()
            .push(value);
    }

    /// Record that a document holds a value for `field`, whatever its type.
    pub fn mark_present(&mut self, field: &str, doc_id: DocId) {
        self.presence
            .entry(field.to_string())
            .or_default()
            .insert(doc_id);
    }

    pub fn remove_document(&mut self, doc_id: DocId) {
        self.columns.retain(|_, docs| {
            docs.remove(&doc_id);
            !docs.is_empty()
        });
        self.presence.retain(|_, docs| {
            docs.remove(&doc_id);
            !docs.is_empty()
        });
    }

    /// A document's values for a field (empty when it has none).
    pub fn values(&self, field: &str, doc_id: DocId) -> &[FieldValue] {
        self.columns
            .get(field)
            .and_then(|docs| docs.get(&doc_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The column of a field, ordered by document.
    pub fn column(&self, field: &str) -> Option<&BTreeMap<DocId, Vec<FieldValue>>> {
        self.columns.get(field)
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.columns.contains_key(field)
    }

    /// Documents holding any value for `field`.
    pub fn documents_with(&self, field: &str) -> BTreeSet<DocId> {
        self.presence.get(field).cloned().unwrap_or_default()
    }

    /// Documents with at least one column value accepted by `predicate`.
    pub fn filter_documents<F>(&self, field: &str, predicate: F) -> BTreeSet<DocId>
    where
        F: Fn(&FieldValue) -> bool,
    {
        self.columns
            .get(field)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, values)| values.iter().any(&predicate))
                    .map(|(doc_id, _)| *doc_id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_and_presence() {
        let mut dv = DocValues::new();
        dv.add_value("balance", 1, FieldValue::Integer(20000));
        dv.add_value("balance", 2, FieldValue::Integer(35000));
        dv.mark_present("balance", 1);
        dv.mark_present("balance", 2);
        dv.mark_present("title", 2);

        assert_eq!(dv.values("balance", 1), &[FieldValue::Integer(20000)]);
        assert!(dv.values("balance", 3).is_empty());
        assert_eq!(dv.documents_with("title"), BTreeSet::from([2]));
        assert!(!dv.has_column("title"));

        let in_range = dv.filter_documents("balance", |v| {
            v.as_f64().is_some_and(|b| (20000.0..=30000.0).contains(&b))
        });
        assert_eq!(in_range, BTreeSet::from([1]));
    }

    #[test]
    fn test_remove_document() {
        let mut dv = DocValues::new();
        dv.add_value("state", 4, FieldValue::Text("ID".into()));
        dv.mark_present("state", 4);
        dv.remove_document(4);
        assert!(dv.column("state").is_none());
        assert!(dv.documents_with("state").is_empty());
    }
}
