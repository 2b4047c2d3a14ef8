//! Mapping-driven document parsing.
//!
//! [`DocumentParser::parse`] walks a JSON source, resolves every value's path
//! against the index mapping (adding dynamic fields where allowed), coerces
//! it to the field type and emits one [`ParsedField`] per value. Multi-fields
//! receive the same raw value coerced to their own type. The result is what
//! indexing consumes, both for stored documents and for the throwaway
//! documents a percolation builds.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::document::document::Source;
use crate::document::field_value::FieldValue;
use crate::error::{QuarryError, Result};
use crate::geo::{GeoPoint, GeoShape};
use crate::query::QueryNode;
use crate::schema::{Dynamic, FieldMapping, FieldType, Mapping};

/// One typed value at one searchable path.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedField {
    pub path: String,
    pub field_type: FieldType,
    pub value: FieldValue,
}

/// The typed view of a document source.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub fields: Vec<ParsedField>,
    /// Paths holding at least one value, multi-fields included.
    pub present: BTreeSet<String>,
    /// The grown mapping, when dynamic mapping introduced new fields.
    pub mapping_update: Option<Mapping>,
}

impl ParsedDocument {
    /// Values of one path in source order.
    pub fn values<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.path == path)
            .map(|f| &f.value)
    }

    pub fn has_field(&self, path: &str) -> bool {
        self.present.contains(path)
    }

    /// Percolator queries held by the document, with the field holding each.
    pub fn queries(&self) -> impl Iterator<Item = (&str, &Arc<QueryNode>)> {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_query().map(|query| (f.path.as_str(), query)))
    }
}

/// Parses sources against a mapping.
pub struct DocumentParser<'a> {
    mapping: Cow<'a, Mapping>,
    parsed: ParsedDocument,
}

impl<'a> DocumentParser<'a> {
    /// Parse `source` against `mapping`.
    pub fn parse(source: &Source, mapping: &'a Mapping) -> Result<ParsedDocument> {
        let mut parser = DocumentParser {
            mapping: Cow::Borrowed(mapping),
            parsed: ParsedDocument::default(),
        };
        parser.walk_object("", source)?;

        let mut parsed = parser.parsed;
        if let Cow::Owned(updated) = parser.mapping {
            parsed.mapping_update = Some(updated);
        }
        Ok(parsed)
    }

    fn walk_object(&mut self, prefix: &str, object: &Source) -> Result<()> {
        for (key, value) in object {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            self.walk_value(&path, value)?;
        }
        Ok(())
    }

    fn walk_value(&mut self, path: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if let Some(field) = self.mapping.get(path).cloned() {
            return self.parse_mapped(path, &field, value);
        }

        match value {
            Value::Object(inner) => self.walk_object(path, inner),
            Value::Array(items) => {
                for item in items {
                    self.walk_value(path, item)?;
                }
                Ok(())
            }
            scalar => match self.mapping.dynamic() {
                Dynamic::False => Ok(()),
                Dynamic::Strict => Err(QuarryError::mapping_conflict(
                    path,
                    "mapped field",
                    "dynamic introduction of a new field (dynamic is [strict])",
                )),
                Dynamic::True => {
                    if self.mapping.is_object(path) {
                        return Err(QuarryError::mapping_conflict(path, "object", scalar.to_string()));
                    }
                    let field = dynamic_mapping_for(scalar);
                    tracing::trace!("dynamic mapping [{path}] as [{}]", field.field_type);
                    self.mapping.to_mut().insert(path, field.clone())?;
                    self.parse_mapped(path, &field, value)
                }
            },
        }
    }

    fn parse_mapped(&mut self, path: &str, field: &FieldMapping, value: &Value) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Array(items)
                if field.field_type == FieldType::GeoPoint && items.iter().all(Value::is_number) =>
            {
                self.emit(path, field, value)
            }
            Value::Array(items) => {
                for item in items {
                    self.parse_mapped(path, field, item)?;
                }
                Ok(())
            }
            _ => self.emit(path, field, value),
        }
    }

    fn emit(&mut self, path: &str, field: &FieldMapping, value: &Value) -> Result<()> {
        if !exceeds_ignore_above(field, value) {
            let coerced = coerce(path, field.field_type, value)?;
            self.push(path.to_string(), field.field_type, coerced);
        }
        for (name, sub) in &field.fields {
            if exceeds_ignore_above(sub, value) {
                continue;
            }
            let sub_path = format!("{path}.{name}");
            let coerced = coerce(&sub_path, sub.field_type, value)?;
            self.push(sub_path, sub.field_type, coerced);
        }
        Ok(())
    }

    fn push(&mut self, path: String, field_type: FieldType, value: FieldValue) {
        self.parsed.present.insert(path.clone());
        self.parsed.fields.push(ParsedField {
            path,
            field_type,
            value,
        });
    }
}

fn exceeds_ignore_above(field: &FieldMapping, value: &Value) -> bool {
    match (field.ignore_above, value) {
        (Some(limit), Value::String(s)) => s.chars().count() > limit,
        _ => false,
    }
}

fn dynamic_mapping_for(value: &Value) -> FieldMapping {
    match value {
        Value::Bool(_) => FieldMapping::new(FieldType::Boolean),
        Value::Number(n) if n.is_i64() || n.is_u64() => FieldMapping::new(FieldType::Integer),
        Value::Number(_) => FieldMapping::new(FieldType::Float),
        _ => FieldMapping::dynamic_string(),
    }
}

/// Coerce one raw JSON value to a field type.
pub fn coerce(path: &str, field_type: FieldType, value: &Value) -> Result<FieldValue> {
    let conflict = || QuarryError::mapping_conflict(path, field_type.name(), value.to_string());

    match field_type {
        FieldType::Text | FieldType::Keyword => match value {
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Ok(FieldValue::Text(b.to_string())),
            _ => Err(conflict()),
        },
        FieldType::Integer => {
            let number = match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => return Ok(FieldValue::Integer(i)),
                    None => n.as_f64(),
                },
                Value::String(s) => match s.trim().parse::<i64>() {
                    Ok(i) => return Ok(FieldValue::Integer(i)),
                    Err(_) => s.trim().parse::<f64>().ok(),
                },
                _ => None,
            };
            match number {
                Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(FieldValue::Integer(f as i64))
                }
                _ => Err(conflict()),
            }
        }
        FieldType::Float => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match number {
                Some(f) if f.is_finite() => Ok(FieldValue::Float(f)),
                _ => Err(conflict()),
            }
        }
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
            Value::String(s) if s == "true" => Ok(FieldValue::Boolean(true)),
            Value::String(s) if s == "false" => Ok(FieldValue::Boolean(false)),
            _ => Err(conflict()),
        },
        FieldType::GeoPoint => GeoPoint::from_json(value)
            .map(|point| FieldValue::Geo(GeoShape::Point(point)))
            .map_err(|_| conflict()),
        FieldType::GeoShape => GeoShape::from_json(value)
            .map(FieldValue::Geo)
            .map_err(|_| conflict()),
        FieldType::Percolator => {
            if !value.is_object() {
                return Err(conflict());
            }
            Ok(FieldValue::Query(Arc::new(QueryNode::from_json(value)?)))
        }
    }
}
