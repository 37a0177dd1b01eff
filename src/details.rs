//! Open key/value map for per-type achievement details
//!
//! Competition records carry a level, publications a venue, certifications an
//! issuer, and so on. None of that is schema enforced: the map accepts any
//! key with any [`DetailValue`]. Typed accessors exist for the few fields the
//! aggregation code reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Detail key holding a competition's level (e.g. "national")
pub const COMPETITION_LEVEL_KEY: &str = "competitionLevel";

/// A single detail value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<DetailValue>),
    Map(BTreeMap<String, DetailValue>),
}

impl DetailValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DetailValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DetailValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DetailValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        DetailValue::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        DetailValue::Text(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        DetailValue::Integer(value)
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        DetailValue::Bool(value)
    }
}

impl From<serde_json::Value> for DetailValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => DetailValue::Null,
            Value::Bool(b) => DetailValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DetailValue::Integer(i),
                None => DetailValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => DetailValue::Text(s),
            Value::Array(items) => DetailValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                DetailValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Detail map attached to achievement content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Details(BTreeMap<String, DetailValue>);

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DetailValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&DetailValue> {
        self.0.get(key)
    }

    /// Text value for `key`, `None` if absent or not text
    pub fn as_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DetailValue::as_str)
    }

    pub fn as_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(DetailValue::as_i64)
    }

    pub fn competition_level(&self) -> Option<&str> {
        self.as_str(COMPETITION_LEVEL_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DetailValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Details {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Details(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let details = Details::new()
            .with(COMPETITION_LEVEL_KEY, "national")
            .with("rank", 2i64)
            .with("team", true);

        assert_eq!(details.competition_level(), Some("national"));
        assert_eq!(details.as_i64("rank"), Some(2));
        assert_eq!(details.as_str("rank"), None);
        assert_eq!(details.get("team").and_then(DetailValue::as_bool), Some(true));
        assert_eq!(details.as_str("missing"), None);
    }

    #[test]
    fn test_from_json_object() {
        let json = serde_json::json!({
            "competitionLevel": "international",
            "score": 91.5,
            "members": ["a", "b"],
            "organizer": { "name": "IEEE" }
        });
        let details: Details = match json {
            serde_json::Value::Object(map) => map.into(),
            _ => unreachable!(),
        };

        assert_eq!(details.competition_level(), Some("international"));
        assert_eq!(details.get("score"), Some(&DetailValue::Float(91.5)));
        assert!(matches!(details.get("members"), Some(DetailValue::List(items)) if items.len() == 2));
        assert!(matches!(details.get("organizer"), Some(DetailValue::Map(_))));
    }

    #[test]
    fn test_messagepack_preserves_variants() {
        let details = Details::new()
            .with("level", "regional")
            .with("rank", 3i64)
            .with("nothing", DetailValue::Null);

        let bytes = rmp_serde::to_vec_named(&details).unwrap();
        let decoded: Details = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, details);
    }
}
