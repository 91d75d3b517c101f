//! Typed metadata values
//!
//! Nodes carry an open bag of extension fields (e.g. `solutionFor` pointing at
//! another node). Values are restricted to scalars so the bag survives the trip
//! through JSON, YAML front matter and back without losing its type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata bag stored on a node
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Scalar metadata value
///
/// Serialized untagged. On input, strings that parse as RFC 3339 become
/// [`MetadataValue::Timestamp`]; all other strings stay [`MetadataValue::String`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Boolean(bool),
    Number(f64),
    Timestamp(DateTime<Utc>),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            MetadataValue::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetadataValue::Timestamp(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_untagged_deserialization_picks_scalar_kind() {
        let bag: Metadata = serde_json::from_value(json!({
            "pinned": true,
            "weight": 2.5,
            "reviewedAt": "2025-03-01T12:00:00Z",
            "solutionFor": "node-123"
        }))
        .unwrap();

        assert_eq!(bag["pinned"], MetadataValue::Boolean(true));
        assert_eq!(bag["weight"], MetadataValue::Number(2.5));
        assert_eq!(
            bag["reviewedAt"],
            MetadataValue::Timestamp(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(bag["solutionFor"].as_str(), Some("node-123"));
    }

    #[test]
    fn test_timestamp_survives_yaml() {
        let mut bag = Metadata::new();
        bag.insert(
            "reviewedAt".to_string(),
            Utc.with_ymd_and_hms(2024, 12, 24, 8, 30, 0).unwrap().into(),
        );

        let yaml = serde_yaml::to_string(&bag).unwrap();
        let back: Metadata = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(back, bag);
    }
}
