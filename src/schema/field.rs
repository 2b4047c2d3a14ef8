//! Field types and per-field mapping definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{QuarryError, Result};

/// The type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Analyzed full text.
    Text,
    /// A single exact term.
    Keyword,
    /// Whole numbers (`integer`, `long`, `short`, `byte`).
    Integer,
    /// Floating point numbers (`float`, `double`, `half_float`, `scaled_float`).
    Float,
    /// `true` / `false`.
    Boolean,
    /// A single latitude/longitude point.
    GeoPoint,
    /// A GeoJSON-like shape.
    GeoShape,
    /// A stored query, matched by `percolate`.
    Percolator,
}

impl FieldType {
    /// Parse a mapping type name, accepting the usual aliases.
    pub fn parse(name: &str) -> Option<FieldType> {
        let field_type = match name {
            "text" | "match_only_text" => FieldType::Text,
            "keyword" | "constant_keyword" | "wildcard" => FieldType::Keyword,
            "integer" | "long" | "short" | "byte" | "unsigned_long" => FieldType::Integer,
            "float" | "double" | "half_float" | "scaled_float" => FieldType::Float,
            "boolean" => FieldType::Boolean,
            "geo_point" => FieldType::GeoPoint,
            "geo_shape" => FieldType::GeoShape,
            "percolator" => FieldType::Percolator,
            _ => return None,
        };
        Some(field_type)
    }

    /// The canonical type name.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::GeoPoint => "geo_point",
            FieldType::GeoShape => "geo_shape",
            FieldType::Percolator => "percolator",
        }
    }

    /// Whether values are numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }

    /// Whether values go into the inverted index as terms.
    pub fn is_analyzed(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Keyword)
    }

    /// Whether values are kept in the columnar doc-value store
    /// (sort, range, script and aggregation access).
    pub fn has_doc_values(&self) -> bool {
        matches!(
            self,
            FieldType::Keyword | FieldType::Integer | FieldType::Float | FieldType::Boolean
        )
    }

    /// Whether values go into the geospatial index.
    pub fn is_geo(&self) -> bool {
        matches!(self, FieldType::GeoPoint | FieldType::GeoShape)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The mapping of one field: its type plus optional multi-fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field_type: FieldType,

    /// Keyword values longer than this are stored but not indexed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_above: Option<usize>,

    /// Sub-fields indexing the same value differently, addressed as `parent.name`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldMapping>,
}

impl FieldMapping {
    pub fn new(field_type: FieldType) -> Self {
        FieldMapping {
            field_type,
            ignore_above: None,
            fields: BTreeMap::new(),
        }
    }

    /// Add a multi-field.
    pub fn with_subfield<S: Into<String>>(mut self, name: S, mapping: FieldMapping) -> Self {
        self.fields.insert(name.into(), mapping);
        self
    }

    pub fn with_ignore_above(mut self, ignore_above: usize) -> Self {
        self.ignore_above = Some(ignore_above);
        self
    }

    /// The mapping dynamic mapping assigns to strings: text plus a keyword sub-field.
    pub fn dynamic_string() -> Self {
        FieldMapping::new(FieldType::Text).with_subfield(
            "keyword",
            FieldMapping::new(FieldType::Keyword).with_ignore_above(256),
        )
    }

    /// Parse a single field definition (`{"type": "...", "fields": {...}}`).
    pub fn from_json(path: &str, definition: &Value) -> Result<Self> {
        let type_name = definition
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QuarryError::invalid_request(format!("no type specified for field [{path}]"))
            })?;
        let field_type = FieldType::parse(type_name).ok_or_else(|| {
            QuarryError::invalid_request(format!(
                "no handler for type [{type_name}] declared on field [{path}]"
            ))
        })?;

        let mut mapping = FieldMapping::new(field_type);
        if let Some(ignore_above) = definition.get("ignore_above").and_then(Value::as_u64) {
            mapping.ignore_above = Some(usize::try_from(ignore_above).unwrap_or(usize::MAX));
        }
        if let Some(fields) = definition.get("fields").and_then(Value::as_object) {
            for (name, sub) in fields {
                let sub_path = format!("{path}.{name}");
                mapping
                    .fields
                    .insert(name.clone(), FieldMapping::from_json(&sub_path, sub)?);
            }
        }
        Ok(mapping)
    }

    /// Render as an Elasticsearch-style field definition.
    pub fn to_json(&self) -> Value {
        let mut def = Map::new();
        def.insert("type".to_string(), json!(self.field_type.name()));
        if let Some(ignore_above) = self.ignore_above {
            def.insert("ignore_above".to_string(), json!(ignore_above));
        }
        if !self.fields.is_empty() {
            let fields: Map<String, Value> = self
                .fields
                .iter()
                .map(|(name, sub)| (name.clone(), sub.to_json()))
                .collect();
            def.insert("fields".to_string(), Value::Object(fields));
        }
        Value::Object(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_aliases() {
        assert_eq!(FieldType::parse("long"), Some(FieldType::Integer));
        assert_eq!(FieldType::parse("double"), Some(FieldType::Float));
        assert_eq!(FieldType::parse("geo_shape"), Some(FieldType::GeoShape));
        assert_eq!(FieldType::parse("nope"), None);
        assert!(FieldType::Integer.is_numeric());
        assert!(FieldType::Keyword.has_doc_values());
        assert!(!FieldType::Text.has_doc_values());
    }

    #[test]
    fn test_field_mapping_with_multi_fields() {
        let def = json!({
            "type": "text",
            "fields": {"raw": {"type": "keyword", "ignore_above": 64}}
        });
        let mapping = FieldMapping::from_json("title", &def).unwrap();
        assert_eq!(mapping.field_type, FieldType::Text);
        assert_eq!(mapping.fields["raw"].field_type, FieldType::Keyword);
        assert_eq!(mapping.fields["raw"].ignore_above, Some(64));
        assert_eq!(mapping.to_json()["fields"]["raw"]["type"], "keyword");
    }

    #[test]
    fn test_field_mapping_unknown_type() {
        let err = FieldMapping::from_json("x", &json!({"type": "hologram"})).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidRequest(_)));
    }
}
