//! Structured values carried as process arguments and outputs.
//!
//! `ProcessValue` serializes as plain JSON. Maps keep insertion order and
//! numbers keep their integer/float representation, so a value read back from
//! the wire is identical to the one that was sent.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Ordered key/value mapping used for argument bags and outputs
pub type ValueMap = IndexMap<String, ProcessValue>;

/// JSON-like tagged union for process arguments and outputs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<ProcessValue>),
    Map(ValueMap),
}

impl ProcessValue {
    /// An empty map
    pub fn object() -> Self {
        ProcessValue::Map(ValueMap::new())
    }

    /// `{"error": message}`, the output recorded for a failed unit of work
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = ValueMap::new();
        map.insert("error".to_string(), ProcessValue::String(message.into()));
        ProcessValue::Map(map)
    }

    /// Convert any serializable value
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(ProcessValue::from)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            ProcessValue::Null => "null",
            ProcessValue::Bool(_) => "boolean",
            ProcessValue::Number(_) => "number",
            ProcessValue::String(_) => "string",
            ProcessValue::List(_) => "list",
            ProcessValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ProcessValue::Null)
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            ProcessValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ProcessValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key when this value is a map
    pub fn get(&self, key: &str) -> Option<&ProcessValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Insert a key, turning `Null` into an empty map first.
    ///
    /// Returns `false` when this value is neither a map nor null.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ProcessValue>) -> bool {
        if self.is_null() {
            *self = ProcessValue::object();
        }
        match self {
            ProcessValue::Map(map) => {
                map.insert(key.into(), value.into());
                true
            }
            _ => false,
        }
    }
}

impl From<serde_json::Value> for ProcessValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ProcessValue::Null,
            serde_json::Value::Bool(b) => ProcessValue::Bool(b),
            serde_json::Value::Number(n) => ProcessValue::Number(n),
            serde_json::Value::String(s) => ProcessValue::String(s),
            serde_json::Value::Array(items) => {
                ProcessValue::List(items.into_iter().map(ProcessValue::from).collect())
            }
            serde_json::Value::Object(fields) => ProcessValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, ProcessValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<ProcessValue> for serde_json::Value {
    fn from(value: ProcessValue) -> Self {
        match value {
            ProcessValue::Null => serde_json::Value::Null,
            ProcessValue::Bool(b) => serde_json::Value::Bool(b),
            ProcessValue::Number(n) => serde_json::Value::Number(n),
            ProcessValue::String(s) => serde_json::Value::String(s),
            ProcessValue::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            ProcessValue::Map(fields) => serde_json::Value::Object(
                fields.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<&str> for ProcessValue {
    fn from(s: &str) -> Self {
        ProcessValue::String(s.to_string())
    }
}

impl From<String> for ProcessValue {
    fn from(s: String) -> Self {
        ProcessValue::String(s)
    }
}

impl From<bool> for ProcessValue {
    fn from(b: bool) -> Self {
        ProcessValue::Bool(b)
    }
}

impl From<i64> for ProcessValue {
    fn from(n: i64) -> Self {
        ProcessValue::Number(n.into())
    }
}

impl From<i32> for ProcessValue {
    fn from(n: i32) -> Self {
        ProcessValue::Number(n.into())
    }
}

impl From<u64> for ProcessValue {
    fn from(n: u64) -> Self {
        ProcessValue::Number(n.into())
    }
}

impl From<f64> for ProcessValue {
    /// Non-finite floats have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        Number::from_f64(n)
            .map(ProcessValue::Number)
            .unwrap_or(ProcessValue::Null)
    }
}

impl<T: Into<ProcessValue>> From<Vec<T>> for ProcessValue {
    fn from(items: Vec<T>) -> Self {
        ProcessValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ProcessValue>> From<Option<T>> for ProcessValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ProcessValue::Null)
    }
}

impl<K: Into<String>, V: Into<ProcessValue>> FromIterator<(K, V)> for ProcessValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ProcessValue::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
