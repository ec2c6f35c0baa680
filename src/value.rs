//! Tagged values produced by extraction

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Number};

/// A single extracted value.
///
/// `NotFound` is the sentinel for "the selector matched nothing" and is
/// deliberately distinct from JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    NotFound,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Element text, attribute values and JSON strings
    Text(String),
    /// Raw data-node content (script/style bodies)
    Data(String),
    List(Vec<Value>),
    Object(Map<String, serde_json::Value>),
}

/// Payload-free tag of a [`Value`], used for exact type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    NotFound,
    Null,
    Bool,
    Int,
    Float,
    Text,
    Data,
    List,
    Object,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Data => "data",
            Self::List => "list",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::NotFound => ValueKind::NotFound,
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Data(_) => ValueKind::Data,
            Self::List(_) => ValueKind::List,
            Self::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    /// Borrow the string payload of `Text` and `Data` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Data(s) => Some(s),
            _ => None,
        }
    }

    /// Collapse a raw match sequence: nothing matched becomes `NotFound`, a
    /// single match becomes a scalar, anything more stays a list.
    pub fn from_matches(mut matches: Vec<Value>) -> Self {
        match matches.len() {
            0 => Self::NotFound,
            1 => matches.pop().unwrap_or(Self::NotFound),
            _ => Self::List(matches),
        }
    }

    /// Convert a JSON value, keeping integers that fit in `i64` exact.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Object(map.clone()),
        }
    }

    /// JSON rendering. `NotFound` has no JSON form and renders as `null`;
    /// [`ExtractionResult`](crate::ExtractionResult) tracks those keys separately.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::NotFound | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::Number(Number::from(*i)),
            Self::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) | Self::Data(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(map.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("<not found>"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) | Self::Data(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Object(map) => write!(f, "{}", serde_json::Value::Object(map.clone())),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}
