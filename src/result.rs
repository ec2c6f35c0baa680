//! Typed access to extraction output

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{ExtractError, Result};
use crate::value::{Value, ValueKind};

/// Element types accepted by [`ExtractionResult::get_list`].
pub trait FromValue: Sized {
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "value";

    fn from_value(value: &Value) -> Option<Self> {
        value.is_found().then(|| value.clone())
    }
}

/// Immutable map from output key to extracted value.
///
/// Every key of the selection that produced it is present: unmatched
/// selectors hold [`Value::NotFound`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    values: BTreeMap<String, Value>,
}

impl ExtractionResult {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.values
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| ExtractError::MissingKey(key.to_string()))
    }

    /// `false` when the selector matched nothing.
    pub fn is_found(&self, key: &str) -> Result<bool> {
        Ok(self.require(key)?.is_found())
    }

    /// Exact tag check; an `Int` is not a `Float`.
    pub fn is_kind(&self, key: &str, kind: ValueKind) -> Result<bool> {
        Ok(self.require(key)?.kind() == kind)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.require(key)? {
            Value::NotFound => Err(coercion(key, "string", &Value::NotFound)),
            value => Ok(value.to_string()),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        match value {
            Value::Int(i) => Ok(*i),
            Value::Float(x) => truncate(*x).ok_or_else(|| coercion(key, "int", value)),
            Value::Text(s) | Value::Data(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(truncate))
                    .ok_or_else(|| coercion(key, "int", value))
            }
            other => Err(coercion(key, "int", other)),
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        match value {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            Value::Text(s) | Value::Data(s) => s.trim().parse::<f64>().map_err(|_| coercion(key, "float", value)),
            other => Err(coercion(key, "float", other)),
        }
    }

    /// Scalars become one-element lists; any element of the wrong type fails
    /// the whole call.
    pub fn get_list<T: FromValue>(&self, key: &str) -> Result<Vec<T>> {
        let value = self.require(key)?;
        elements(key, value)?
            .iter()
            .map(|item| T::from_value(item).ok_or_else(|| coercion(key, T::EXPECTED, item)))
            .collect()
    }

    /// Like [`get_list`](Self::get_list) over string elements, applying
    /// `transform` to each one.
    pub fn get_list_with<T, E, F>(&self, key: &str, transform: F) -> Result<Vec<T>>
    where
        E: Display,
        F: Fn(&str) -> std::result::Result<T, E>,
    {
        let value = self.require(key)?;
        elements(key, value)?
            .iter()
            .map(|item| {
                let s = item.as_str().ok_or_else(|| coercion(key, "string", item))?;
                transform(s).map_err(|e| ExtractError::Coercion {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                    found: format!("`{s}` ({e})"),
                })
            })
            .collect()
    }
}

fn elements<'a>(key: &str, value: &'a Value) -> Result<&'a [Value]> {
    match value {
        Value::NotFound => Err(coercion(key, "list", value)),
        Value::List(items) => Ok(items),
        scalar => Ok(std::slice::from_ref(scalar)),
    }
}

/// Integer part of `x`, or `None` when it does not fit an `i64`.
fn truncate(x: f64) -> Option<i64> {
    let x = x.trunc();
    // `i64::MAX as f64` rounds up to 2^63, one past the range
    (x >= i64::MIN as f64 && x < i64::MAX as f64).then_some(x as i64)
}

fn coercion(key: &str, expected: &'static str, found: &Value) -> ExtractError {
    ExtractError::Coercion {
        key: key.to_string(),
        expected,
        found: found.kind().to_string(),
    }
}

impl FromIterator<(String, Value)> for ExtractionResult {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let values: BTreeMap<&str, &Value> = self
            .values
            .iter()
            .filter(|(_, v)| v.is_found())
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        let not_found: Vec<&str> = self
            .values
            .iter()
            .filter(|(_, v)| !v.is_found())
            .map(|(k, _)| k.as_str())
            .collect();

        let mut state = serializer.serialize_struct("ExtractionResult", 2)?;
        state.serialize_field("values", &values)?;
        state.serialize_field("not_found", &not_found)?;
        state.end()
    }
}
