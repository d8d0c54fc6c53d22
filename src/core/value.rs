use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::{ModelError, Result};

/// In-memory attribute value.
///
/// Virtual fields are stored as raw JSON inside the backing column and turned
/// into a `Value` on every read; `to_json` is the inverse used on writes.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Mapping(BTreeMap<String, Value>),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Date(_) => "DATE",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::Mapping(_) => "MAPPING",
            Self::Sequence(_) => "SEQUENCE",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => {
                if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Null, `false`, whitespace-only text and empty collections are blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Boolean(b) => !b,
            Self::Text(s) => s.trim().is_empty(),
            Self::Mapping(m) => m.is_empty(),
            Self::Sequence(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Converts a raw stored JSON value. Strings are kept as text; typing them
    /// is the coercer's job.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            JsonValue::String(s) => Self::Text(s.clone()),
            JsonValue::Array(items) => Self::Sequence(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// JSON form written into the backing column.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Integer(i) => JsonValue::from(*i),
            // NaN and infinities have no JSON form
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Text(s) => JsonValue::String(s.clone()),
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            Self::Timestamp(t) => {
                JsonValue::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Mapping(m) => JsonValue::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Sequence(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                (a - b).abs() < f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Mapping(a), Self::Mapping(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                (*i as f64 - f).abs() < f64::EPSILON
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Mapping(_) | Self::Sequence(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// The closed set of types a virtual field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Mapping,
    Sequence,
    Date,
    Timestamp,
    Null,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Whether `value` already is of this type. Integers count as floats.
    pub fn is_instance(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Text, Value::Text(_))
                | (Self::Integer, Value::Integer(_))
                | (Self::Float, Value::Float(_) | Value::Integer(_))
                | (Self::Boolean, Value::Boolean(_))
                | (Self::Mapping, Value::Mapping(_))
                | (Self::Sequence, Value::Sequence(_))
                | (Self::Date, Value::Date(_))
                | (Self::Timestamp, Value::Timestamp(_))
                | (Self::Null, Value::Null)
        )
    }
}

impl FromStr for FieldType {
    type Err = ModelError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(Self::Text),
            "integer" | "int" | "fixnum" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "boolean" | "bool" | "trueclass" | "falseclass" => Ok(Self::Boolean),
            "hash" | "mapping" | "object" => Ok(Self::Mapping),
            "array" | "sequence" => Ok(Self::Sequence),
            "date" => Ok(Self::Date),
            "time" | "datetime" | "timestamp" => Ok(Self::Timestamp),
            "nil" | "null" | "nilclass" => Ok(Self::Null),
            _ => Err(ModelError::Configuration(format!(
                "{} cannot be serialized to JSON",
                name
            ))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "TEXT"),
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Mapping => write!(f, "MAPPING"),
            Self::Sequence => write!(f, "SEQUENCE"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Null => write!(f, "NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Integer(42), Value::Integer(42));
        assert_eq!(Value::Float(3.0), Value::Integer(3));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_ne!(Value::Integer(1), Value::Text("1".into()));
    }

    #[test]
    fn test_json_forms() {
        let date = NaiveDate::from_ymd_opt(1982, 10, 19).unwrap();
        assert_eq!(Value::Date(date).to_json(), json!("1982-10-19"));
        assert_eq!(Value::Float(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(
            Value::from_json(&json!({"a": [1, "b", null]})),
            Value::Mapping(BTreeMap::from([(
                "a".to_string(),
                Value::Sequence(vec![Value::Integer(1), Value::Text("b".into()), Value::Null])
            )]))
        );
    }

    #[test]
    fn test_blankness() {
        assert!(Value::Text(" \t".into()).is_blank());
        assert!(Value::Boolean(false).is_blank());
        assert!(!Value::Integer(0).is_blank());
        assert!(Value::Sequence(vec![]).is_blank());
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!("Fixnum".parse::<FieldType>().unwrap(), FieldType::Integer);
        assert_eq!("TrueClass".parse::<FieldType>().unwrap(), FieldType::Boolean);
        let err = "Regexp".parse::<FieldType>().unwrap_err();
        assert!(err.to_string().contains("Regexp"));
    }

    #[test]
    fn test_instance_check() {
        assert!(FieldType::Float.is_instance(&Value::Integer(2)));
        assert!(!FieldType::Integer.is_instance(&Value::Float(2.0)));
        assert!(!FieldType::Date.is_instance(&Value::Text("2020-01-01".into())));
    }
}
