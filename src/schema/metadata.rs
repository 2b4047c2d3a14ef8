//! Index metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::schema::mapping::Mapping;
use crate::schema::settings::IndexSettings;

/// Name, mapping and settings of one index.
///
/// Metadata is replaced wholesale (copy-on-write) when dynamic mapping adds
/// fields, so readers holding an `Arc` keep a consistent view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    pub uuid: String,
    pub settings: IndexSettings,
    pub mapping: Mapping,
    pub created_at: DateTime<Utc>,
}

impl IndexMetadata {
    pub fn new<S: Into<String>>(name: S, settings: IndexSettings, mapping: Mapping) -> Self {
        IndexMetadata {
            name: name.into(),
            uuid: uuid::Uuid::new_v4().simple().to_string(),
            settings,
            mapping,
            created_at: Utc::now(),
        }
    }

    /// A copy with a different mapping.
    pub fn with_mapping(&self, mapping: Mapping) -> Self {
        IndexMetadata {
            mapping,
            ..self.clone()
        }
    }

    /// Render as the body of a get-index response.
    pub fn to_json(&self) -> Value {
        let mut settings = self.settings.to_json();
        if let Some(index) = settings.get_mut("index").and_then(Value::as_object_mut) {
            index.insert("uuid".to_string(), json!(self.uuid));
            index.insert(
                "creation_date".to_string(),
                json!(self.created_at.timestamp_millis().to_string()),
            );
            index.insert("provided_name".to_string(), json!(self.name));
        }
        json!({
            "mappings": self.mapping.to_json(),
            "settings": settings,
        })
    }
}
