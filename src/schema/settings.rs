//! Per-index settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{QuarryError, Result};

/// How often pending writes of an index become searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshInterval {
    /// Writes become visible once they are this old.
    Every(Duration),
    /// Only an explicit refresh makes writes visible (`"-1"`).
    Disabled,
}

impl RefreshInterval {
    /// Parse `"1s"`, `"250ms"`, `"-1"` and friends.
    pub fn parse(value: &str) -> Result<Self> {
        if value.trim() == "-1" {
            return Ok(RefreshInterval::Disabled);
        }
        parse_time_value(value).map(RefreshInterval::Every)
    }

    fn to_json(self) -> Value {
        match self {
            RefreshInterval::Every(duration) => json!(format!("{}ms", duration.as_millis())),
            RefreshInterval::Disabled => json!("-1"),
        }
    }
}

/// Settings recorded for an index.
///
/// Shard and replica counts are never used for physical placement. The
/// shard count only sets the default partition count of terms aggregations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    /// `None` means the engine-wide default applies.
    pub refresh_interval: Option<RefreshInterval>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            number_of_shards: 1,
            number_of_replicas: 1,
            refresh_interval: None,
        }
    }
}

impl IndexSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(mut self, shards: u32) -> Self {
        self.number_of_shards = shards;
        self
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.number_of_replicas = replicas;
        self
    }

    pub fn with_refresh_interval(mut self, interval: RefreshInterval) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Parse a settings body, starting from `defaults`.
    ///
    /// Keys may be flat (`number_of_shards`), prefixed (`index.number_of_shards`)
    /// or nested under `"index"`. Values may be numbers or strings.
    pub fn from_json(value: &Value, defaults: IndexSettings) -> Result<Self> {
        let mut settings = defaults;
        let body = match value {
            Value::Null => return Ok(settings),
            Value::Object(map) => map,
            other => {
                return Err(QuarryError::invalid_request(format!(
                    "settings must be an object, got {other}"
                )));
            }
        };

        let mut flat = Map::new();
        flatten_settings("", body, &mut flat);

        for (key, value) in &flat {
            let key = key.strip_prefix("index.").unwrap_or(key);
            match key {
                "number_of_shards" => {
                    settings.number_of_shards = positive_count(key, value)?;
                }
                "number_of_replicas" => {
                    settings.number_of_replicas = count(key, value)?;
                }
                "refresh_interval" => {
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    settings.refresh_interval = Some(RefreshInterval::parse(&text)?);
                }
                _ => {
                    tracing::debug!("ignoring unsupported index setting [{key}]");
                }
            }
        }
        Ok(settings)
    }

    /// Render as an Elasticsearch-style settings body.
    pub fn to_json(&self) -> Value {
        let mut index = Map::new();
        index.insert(
            "number_of_shards".to_string(),
            json!(self.number_of_shards.to_string()),
        );
        index.insert(
            "number_of_replicas".to_string(),
            json!(self.number_of_replicas.to_string()),
        );
        if let Some(interval) = self.refresh_interval {
            index.insert("refresh_interval".to_string(), interval.to_json());
        }
        json!({ "index": index })
    }
}

fn flatten_settings(prefix: &str, body: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in body {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_settings(&path, nested, out),
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}

fn count(key: &str, value: &Value) -> Result<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| QuarryError::invalid_request(format!("failed to parse [{key}]: {value}")))
}

fn positive_count(key: &str, value: &Value) -> Result<u32> {
    match count(key, value)? {
        0 => Err(QuarryError::invalid_request(format!(
            "failed to parse [{key}]: must be >= 1"
        ))),
        n => Ok(n),
    }
}

/// Parse an Elasticsearch time value such as `"30s"`, `"500ms"` or `"2m"`.
/// A bare number is taken as milliseconds.
pub fn parse_time_value(value: &str) -> Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| QuarryError::invalid_request(format!("failed to parse time value [{value}]")))?;

    let millis = match unit {
        "" | "ms" => number,
        "s" => number * 1_000.0,
        "m" => number * 60_000.0,
        "h" => number * 3_600_000.0,
        "d" => number * 86_400_000.0,
        _ => {
            return Err(QuarryError::invalid_request(format!(
                "failed to parse time value [{value}]: unknown unit [{unit}]"
            )));
        }
    };
    Ok(Duration::from_micros((millis * 1_000.0).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_and_nested() {
        let flat = IndexSettings::from_json(
            &json!({"number_of_shards": 5, "number_of_replicas": "0"}),
            IndexSettings::default(),
        )
        .unwrap();
        assert_eq!(flat.number_of_shards, 5);
        assert_eq!(flat.number_of_replicas, 0);
        assert_eq!(flat.refresh_interval, None);

        let nested = IndexSettings::from_json(
            &json!({"index": {"number_of_shards": "3", "refresh_interval": "-1"}}),
            IndexSettings::default(),
        )
        .unwrap();
        assert_eq!(nested.number_of_shards, 3);
        assert_eq!(nested.number_of_replicas, 1);
        assert_eq!(nested.refresh_interval, Some(RefreshInterval::Disabled));

        let prefixed = IndexSettings::from_json(
            &json!({"index.refresh_interval": "250ms"}),
            IndexSettings::default(),
        )
        .unwrap();
        assert_eq!(
            prefixed.refresh_interval,
            Some(RefreshInterval::Every(Duration::from_millis(250)))
        );
    }

    #[test]
    fn test_zero_shards_rejected() {
        let err = IndexSettings::from_json(&json!({"number_of_shards": 0}), IndexSettings::default())
            .unwrap_err();
        assert!(matches!(err, QuarryError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_time_value() {
        assert_eq!(parse_time_value("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_time_value("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_time_value("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_time_value("40").unwrap(), Duration::from_millis(40));
        assert!(parse_time_value("5 parsecs").is_err());
        assert!(parse_time_value("s").is_err());
    }

    #[test]
    fn test_settings_to_json() {
        let settings = IndexSettings::new()
            .with_shards(2)
            .with_replicas(0)
            .with_refresh_interval(RefreshInterval::Every(Duration::from_secs(1)));
        let json = settings.to_json();
        assert_eq!(json["index"]["number_of_shards"], "2");
        assert_eq!(json["index"]["refresh_interval"], "1000ms");
    }
}
