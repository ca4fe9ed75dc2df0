use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::Serialize;

use crate::date::parse_yaml_timestamp;

pub type Timestamp = DateTime<FixedOffset>;

/// YAML tag carried by scalars that were written as unquoted timestamps.
pub(crate) const TIMESTAMP_TAG: &str = "!timestamp";

/// Open-ended attribute mapping: front matter keys plus configured defaults.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Timestamp(Timestamp),
    Sequence(Vec<Value>),
    Mapping(Attributes),
}

impl Value {
    /// Truthiness as front matter authors expect it: null, `false`, zero and
    /// the empty string are falsy, everything else (including empty lists) is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Timestamp(_) | Value::Sequence(_) | Value::Mapping(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// String form of a scalar; `None` for null, sequences and mappings.
    pub fn to_plain_string(&self) -> Option<String> {
        match self {
            Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }

    /// Converts a parsed YAML document node. Strings stay strings; only
    /// scalars tagged `!timestamp` become [`Value::Timestamp`].
    pub fn from_yaml(value: serde_yaml::Value) -> Value {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => number_value(n.as_i64(), n.as_f64()),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                Value::Sequence(items.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(mapping) => Value::Mapping(
                mapping
                    .into_iter()
                    .filter_map(|(key, value)| {
                        yaml_key(key).map(|key| (key, Value::from_yaml(value)))
                    })
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => {
                let tagged = *tagged;
                match tagged.value {
                    serde_yaml::Value::String(s) if tagged.tag == TIMESTAMP_TAG => {
                        match parse_yaml_timestamp(&s) {
                            Some(ts) => Value::Timestamp(ts),
                            None => Value::String(s),
                        }
                    }
                    other => Value::from_yaml(other),
                }
            }
        }
    }

    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => number_value(n.as_i64(), n.as_f64()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

/// Builds an [`Attributes`] mapping from a JSON object; other JSON values yield an empty mapping.
pub fn attributes_from_json(value: serde_json::Value) -> Attributes {
    match Value::from_json(value) {
        Value::Mapping(map) => map,
        _ => Attributes::new(),
    }
}

fn number_value(int: Option<i64>, float: Option<f64>) -> Value {
    match (int, float) {
        (Some(n), _) => Value::Integer(n),
        (None, Some(f)) => Value::Float(f),
        (None, None) => Value::Null,
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Null => Some("null".to_string()),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Sequence(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Mapping(_) => write!(f, "[mapping]"),
            other => write!(f, "{}", other.to_plain_string().unwrap_or_default()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Sequence(value.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn truthiness_follows_front_matter_conventions() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Sequence(Vec::new()).is_truthy());
    }

    #[test]
    fn tagged_timestamps_become_structured() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("date: !timestamp 2013-02-01\ntitle: x").unwrap();
        let Value::Mapping(map) = Value::from_yaml(yaml) else {
            panic!("expected mapping");
        };
        let expected = Utc.with_ymd_and_hms(2013, 2, 1, 0, 0, 0).unwrap().fixed_offset();
        assert_eq!(map.get("date"), Some(&Value::Timestamp(expected)));
        assert_eq!(map.get("title"), Some(&Value::from("x")));
    }

    #[test]
    fn untagged_date_strings_stay_strings() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("slug: \"2013-02-01\"\nother: !custom 2013-02-01").unwrap();
        let Value::Mapping(map) = Value::from_yaml(yaml) else {
            panic!("expected mapping");
        };
        assert_eq!(map.get("slug"), Some(&Value::from("2013-02-01")));
        assert_eq!(map.get("other"), Some(&Value::from("2013-02-01")));
    }

    #[test]
    fn json_objects_convert_to_attributes() {
        let attrs = attributes_from_json(serde_json::json!({"a": 1, "b": [true, "c"]}));
        assert_eq!(attrs.get("a"), Some(&Value::Integer(1)));
        assert_eq!(
            attrs.get("b"),
            Some(&Value::Sequence(vec![Value::Bool(true), Value::from("c")]))
        );
        assert!(attributes_from_json(serde_json::json!("scalar")).is_empty());
    }
}
