//! Index mappings.
//!
//! Object properties are flattened into dotted leaf paths when parsed, so
//! `{"address": {"properties": {"city": {"type": "keyword"}}}}` declares the
//! single field `address.city`. Multi-fields stay attached to their parent
//! and are resolved through [`Mapping::resolve`].
//!
//! # Examples
//!
//! ```
//! use quarry::schema::{FieldType, Mapping};
//! use serde_json::json;
//!
//! // Typed (`_doc`) and typeless bodies are both accepted.
//! let mapping = Mapping::from_json(&json!({
//!     "_doc": {"properties": {"location": {"type": "geo_shape"}}}
//! })).unwrap();
//! assert_eq!(mapping.resolve("location"), Some(FieldType::GeoShape));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{QuarryError, Result};
use crate::schema::field::{FieldMapping, FieldType};

/// How unmapped fields in incoming documents are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dynamic {
    /// Infer a type from the first value and add it to the mapping.
    #[default]
    True,
    /// Keep the value in the source but do not index it.
    False,
    /// Reject the document.
    Strict,
}

impl Dynamic {
    fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(true) => Ok(Dynamic::True),
            Value::Bool(false) => Ok(Dynamic::False),
            Value::String(s) => match s.as_str() {
                "true" => Ok(Dynamic::True),
                "false" => Ok(Dynamic::False),
                "strict" => Ok(Dynamic::Strict),
                other => Err(QuarryError::invalid_request(format!(
                    "unknown dynamic setting [{other}]"
                ))),
            },
            other => Err(QuarryError::invalid_request(format!(
                "unknown dynamic setting [{other}]"
            ))),
        }
    }

    fn to_json(self) -> Value {
        match self {
            Dynamic::True => json!(true),
            Dynamic::False => json!(false),
            Dynamic::Strict => json!("strict"),
        }
    }
}

/// The field mapping of one index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    dynamic: Dynamic,
    properties: BTreeMap<String, FieldMapping>,
}

impl Mapping {
    /// An empty mapping with dynamic mapping enabled.
    pub fn new() -> Self {
        Mapping::default()
    }

    pub fn with_dynamic(mut self, dynamic: Dynamic) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Declare a field.
    pub fn with_field<S: Into<String>>(mut self, path: S, mapping: FieldMapping) -> Self {
        self.properties.insert(path.into(), mapping);
        self
    }

    /// Parse a mappings body, typeless or wrapped in a single type name.
    pub fn from_json(value: &Value) -> Result<Self> {
        let body = match value {
            Value::Null => return Ok(Mapping::new()),
            Value::Object(map) => map,
            other => {
                return Err(QuarryError::invalid_request(format!(
                    "mappings must be an object, got {other}"
                )));
            }
        };
        if body.is_empty() {
            return Ok(Mapping::new());
        }

        let is_typeless = body.contains_key("properties") || body.contains_key("dynamic");
        let body = if is_typeless {
            body
        } else if body.len() == 1 {
            match body.values().next() {
                Some(Value::Object(inner)) => inner,
                _ => {
                    return Err(QuarryError::invalid_request(
                        "root mapping definition has unsupported parameters",
                    ));
                }
            }
        } else {
            return Err(QuarryError::invalid_request(
                "root mapping definition has unsupported parameters",
            ));
        };

        let mut mapping = Mapping::new();
        if let Some(dynamic) = body.get("dynamic") {
            mapping.dynamic = Dynamic::from_json(dynamic)?;
        }
        if let Some(properties) = body.get("properties") {
            let properties = properties
                .as_object()
                .ok_or_else(|| QuarryError::invalid_request("[properties] must be an object"))?;
            parse_properties("", properties, &mut mapping.properties)?;
        }
        Ok(mapping)
    }

    pub fn dynamic(&self) -> Dynamic {
        self.dynamic
    }

    /// The mapping declared for a leaf path (not a multi-field).
    pub fn get(&self, path: &str) -> Option<&FieldMapping> {
        self.properties.get(path)
    }

    /// The type of a searchable path: a leaf field or `leaf.subfield`.
    pub fn resolve(&self, path: &str) -> Option<FieldType> {
        if let Some(mapping) = self.properties.get(path) {
            return Some(mapping.field_type);
        }
        let (parent, sub) = path.rsplit_once('.')?;
        self.properties
            .get(parent)
            .and_then(|mapping| mapping.fields.get(sub))
            .map(|sub| sub.field_type)
    }

    /// Whether `path` names an object that contains mapped fields.
    pub fn is_object(&self, path: &str) -> bool {
        let prefix = format!("{path}.");
        self.properties.keys().any(|key| key.starts_with(&prefix))
    }

    /// Declared leaf fields in path order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldMapping)> {
        self.properties.iter()
    }

    /// Every searchable path (leaves and multi-fields) with its type.
    pub fn searchable_fields(&self) -> Vec<(String, FieldType)> {
        let mut fields = Vec::new();
        for (path, mapping) in &self.properties {
            fields.push((path.clone(), mapping.field_type));
            for (sub, sub_mapping) in &mapping.fields {
                fields.push((format!("{path}.{sub}"), sub_mapping.field_type));
            }
        }
        fields
    }

    /// Searchable paths of one type.
    pub fn fields_of_type(&self, field_type: FieldType) -> Vec<String> {
        self.searchable_fields()
            .into_iter()
            .filter(|(_, ty)| *ty == field_type)
            .map(|(path, _)| path)
            .collect()
    }

    /// Add a field, failing if the path is already mapped with another type.
    pub fn insert(&mut self, path: &str, mapping: FieldMapping) -> Result<()> {
        if let Some(existing) = self.properties.get(path) {
            if existing.field_type != mapping.field_type {
                return Err(QuarryError::mapping_conflict(
                    path,
                    existing.field_type.name(),
                    mapping.field_type.name(),
                ));
            }
            return Ok(());
        }
        self.properties.insert(path.to_string(), mapping);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render as a typeless Elasticsearch mappings body with nested objects.
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        for (path, mapping) in &self.properties {
            let mut node = &mut root;
            let mut segments = path.split('.').peekable();
            while let Some(segment) = segments.next() {
                if segments.peek().is_none() {
                    node.insert(segment.to_string(), mapping.to_json());
                    break;
                }
                let object = node
                    .entry(segment.to_string())
                    .or_insert_with(|| json!({"properties": {}}));
                node = match object
                    .as_object_mut()
                    .and_then(|o| o.get_mut("properties"))
                    .and_then(Value::as_object_mut)
                {
                    Some(properties) => properties,
                    None => break,
                };
            }
        }

        let mut body = Map::new();
        if self.dynamic != Dynamic::True {
            body.insert("dynamic".to_string(), self.dynamic.to_json());
        }
        body.insert("properties".to_string(), Value::Object(root));
        Value::Object(body)
    }
}

fn parse_properties(
    prefix: &str,
    properties: &Map<String, Value>,
    out: &mut BTreeMap<String, FieldMapping>,
) -> Result<()> {
    for (name, definition) in properties {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        let type_name = definition.get("type").and_then(Value::as_str);
        match type_name {
            None | Some("object") | Some("nested") => {
                let nested = definition
                    .get("properties")
                    .and_then(Value::as_object)
                    .ok_or_else(|| {
                        QuarryError::invalid_request(format!(
                            "no type specified for field [{path}]"
                        ))
                    })?;
                parse_properties(&path, nested, out)?;
            }
            Some(_) => {
                out.insert(path.clone(), FieldMapping::from_json(&path, definition)?);
            }
        }
    }
    Ok(())
}
