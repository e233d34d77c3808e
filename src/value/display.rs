//! Text and JSON forms of values

use super::{narrow_number, Val, Value};
use serde::ser::{Error as _, SerializeMap, SerializeSeq, SerializeTuple};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.val() {
            Val::Boolean(b) => write!(f, "{}", b),
            Val::Integer(i) => write!(f, "{}", i),
            Val::String(s) => match serde_json::to_string(s) {
                Ok(quoted) => f.write_str(&quoted),
                Err(_) => write!(f, "{:?}", s),
            },
            Val::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Val::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Val::Pair(first, second) => write!(f, "({}, {})", first, second),
            Val::Record(_) => f.write_str("<record>"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.val() {
            Val::Boolean(b) => serializer.serialize_bool(*b),
            Val::Integer(i) => serializer.serialize_i64(*i),
            Val::String(s) => serializer.serialize_str(s),
            Val::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Val::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Val::Pair(first, second) => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(first)?;
                tuple.serialize_element(second)?;
                tuple.end()
            }
            Val::Record(_) => Err(S::Error::custom("records cannot be serialized")),
        }
    }
}

impl Value {
    /// JSON form of this value
    pub fn to_json(&self) -> serde_json::Result<JsonValue> {
        serde_json::to_value(self)
    }

    /// Build a value from JSON
    ///
    /// `null` has no value form: it yields `None` at the top level and is
    /// dropped inside arrays and objects. Floats are narrowed the same lossy
    /// way script numbers are.
    pub fn from_json(json: &JsonValue) -> Option<Value> {
        match json {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(Value::boolean(*b)),
            JsonValue::Number(n) => {
                let i = match (n.as_i64(), n.as_u64()) {
                    (Some(i), _) => i,
                    (None, Some(u)) => i64::try_from(u).unwrap_or(i64::MAX),
                    (None, None) => narrow_number(n.as_f64().unwrap_or(0.0)),
                };
                Some(Value::integer(i))
            }
            JsonValue::String(s) => Some(Value::string(s.as_str())),
            JsonValue::Array(items) => Some(Value::list(
                items.iter().filter_map(Value::from_json).collect(),
            )),
            JsonValue::Object(fields) => Some(Value::map(
                fields
                    .iter()
                    .filter_map(|(k, v)| Some((Value::string(k.as_str()), Value::from_json(v)?)))
                    .collect(),
            )),
        }
    }
}
