//! Hit ordering.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::FieldValue;
use crate::error::{QuarryError, Result};
use crate::lexical::DocId;
use crate::schema::{FieldType, Mapping};
use crate::search::searchable::SearchableState;

/// Sort order for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order (lowest to highest).
    #[default]
    Asc,
    /// Descending order (highest to lowest).
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(QuarryError::invalid_request(format!(
                "unknown sort order [{other}]"
            ))),
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortField {
    /// Relevance. Every match scores the same, so this leaves the default
    /// order (index name, then id) in place.
    Score,
    /// The document id.
    Id(SortOrder),
    /// A field's doc values.
    Field { name: String, order: SortOrder },
}

impl SortField {
    pub fn field<S: Into<String>>(name: S, order: SortOrder) -> Self {
        SortField::Field {
            name: name.into(),
            order,
        }
    }

    fn from_name(name: &str, order: SortOrder) -> Self {
        match name {
            "_score" => SortField::Score,
            "_id" => SortField::Id(order),
            "_doc" => SortField::Score,
            field => SortField::field(field, order),
        }
    }

    /// Parse the `sort` URL parameter: `field[:order]` entries separated by
    /// commas, e.g. `account_number:asc`.
    pub fn parse_param(param: &str) -> Result<Vec<SortField>> {
        param
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.rsplit_once(':') {
                Some((name, order)) => Ok(SortField::from_name(name, SortOrder::parse(order)?)),
                None => Ok(SortField::from_name(entry, SortOrder::Asc)),
            })
            .collect()
    }

    /// Parse the `sort` body attribute: a name, `{name: order}`,
    /// `{name: {"order": order}}` or an array of those.
    pub fn parse_json(value: &Value) -> Result<Vec<SortField>> {
        match value {
            Value::Array(items) => {
                let mut fields = Vec::new();
                for item in items {
                    fields.extend(SortField::parse_json(item)?);
                }
                Ok(fields)
            }
            Value::String(name) => Ok(SortField::parse_param(name)?),
            Value::Object(entries) => entries
                .iter()
                .map(|(name, spec)| {
                    let order = match spec {
                        Value::String(order) => SortOrder::parse(order)?,
                        Value::Object(options) => match options.get("order") {
                            Some(Value::String(order)) => SortOrder::parse(order)?,
                            None => SortOrder::Asc,
                            Some(other) => {
                                return Err(QuarryError::invalid_request(format!(
                                    "invalid sort order {other}"
                                )));
                            }
                        },
                        other => {
                            return Err(QuarryError::invalid_request(format!(
                                "invalid sort specification {other}"
                            )));
                        }
                    };
                    Ok(SortField::from_name(name, order))
                })
                .collect(),
            other => Err(QuarryError::invalid_request(format!(
                "invalid sort specification {other}"
            ))),
        }
    }
}

/// The sort values of one hit, one per criterion. `None` marks a missing
/// value (and criteria that produce no value, like `_score`).
pub type SortKey = Vec<Option<FieldValue>>;

/// Compute the sort key of a document.
pub fn sort_key(
    state: &SearchableState,
    mapping: &Mapping,
    doc_id: DocId,
    id: &str,
    sort: &[SortField],
) -> Result<SortKey> {
    sort.iter()
        .map(|criterion| match criterion {
            SortField::Score => Ok(None),
            SortField::Id(_) => Ok(Some(FieldValue::Text(id.to_string()))),
            SortField::Field { name, order } => {
                match mapping.resolve(name) {
                    Some(FieldType::Text) => {
                        return Err(QuarryError::invalid_request(format!(
                            "Fielddata is disabled on text fields by default, cannot sort on [{name}]"
                        )));
                    }
                    Some(ty) if !ty.has_doc_values() => {
                        return Err(QuarryError::invalid_request(format!(
                            "cannot sort on field [{name}] of type [{ty}]"
                        )));
                    }
                    _ => {}
                }
                // Multi-valued fields sort by their smallest value ascending
                // and their largest value descending.
                let values = state.doc_values().values(name, doc_id);
                let picked = match order {
                    SortOrder::Asc => values.iter().min_by(|a, b| a.total_cmp(b)),
                    SortOrder::Desc => values.iter().max_by(|a, b| a.total_cmp(b)),
                };
                Ok(picked.cloned())
            }
        })
        .collect()
}

/// Compare two sort keys. Missing values sort last in either direction.
pub fn compare_keys(a: &SortKey, b: &SortKey, sort: &[SortField]) -> Ordering {
    for ((a, b), criterion) in a.iter().zip(b.iter()).zip(sort) {
        let order = match criterion {
            SortField::Score => continue,
            SortField::Id(order) | SortField::Field { order, .. } => *order,
        };
        let ordering = match (a, b) {
            (Some(a), Some(b)) => order.apply(a.total_cmp(b)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
