//! The XRay status document and its field accessors.
//!
//! XRay exposes its runtime state through Go's `expvar` page
//! (`/debug/vars`). Only a handful of top-level sections matter here:
//!
//! ```text
//! {
//!   "memstats":    { "Alloc": 1, "TotalAlloc": 2, "Sys": 3, "Mallocs": 4, "Frees": 5, ... },
//!   "observatory": { "<outbound tag>": { "delay": 120, "alive": true }, ... },
//!   "stats": {
//!     "inbound":  { "<tag>":  { "uplink": 0, "downlink": 0 }, ... },
//!     "outbound": { "<tag>":  { "uplink": 0, "downlink": 0 }, ... },
//!     "user":     { "<email>": { "uplink": 0, "downlink": 0 }, ... }
//!   }
//! }
//! ```
//!
//! Every section is optional. The document is kept as a schema-agnostic
//! [`serde_json::Value`] tree and read through [`Field`], which keeps "the key
//! is absent" separate from "the key holds the wrong kind of value".

use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{Error, Result};

/// A structural problem found while reading a status document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("`{path}` should be an object but is {found}")]
    NotAnObject { path: String, found: &'static str },

    #[error("`{path}` should be numeric but is {found}")]
    NotNumeric { path: String, found: &'static str },
}

/// Result of looking a key up in the document tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    /// The key does not exist (or an enclosing value was not an object).
    Missing,
    /// The key exists; the value may still be of any JSON type, including null.
    Present(&'a Value),
}

impl<'a> Field<'a> {
    /// Look up `key` inside this field. Anything but an object has no children.
    pub fn get(self, key: &str) -> Field<'a> {
        match self {
            Field::Present(Value::Object(map)) => {
                map.get(key).map_or(Field::Missing, Field::Present)
            }
            _ => Field::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }

    /// Read this field as an object.
    ///
    /// `Ok(None)` when missing, an error when present but not an object.
    pub fn as_object(
        self,
        path: &str,
    ) -> std::result::Result<Option<&'a Map<String, Value>>, FieldError> {
        match self {
            Field::Missing => Ok(None),
            Field::Present(Value::Object(map)) => Ok(Some(map)),
            Field::Present(other) => Err(FieldError::NotAnObject {
                path: path.to_string(),
                found: value_kind(other),
            }),
        }
    }

    /// Read this field as a number.
    ///
    /// Numbers, booleans (1/0) and numeric strings are accepted. `Ok(None)`
    /// when missing; anything else (null included) is an error.
    pub fn as_number(self, path: &str) -> std::result::Result<Option<f64>, FieldError> {
        match self {
            Field::Missing => Ok(None),
            Field::Present(value) => {
                coerce_number(value)
                    .map(Some)
                    .ok_or_else(|| FieldError::NotNumeric {
                        path: path.to_string(),
                        found: value_kind(value),
                    })
            }
        }
    }

    /// Loose truthiness: false, null, zero, "" and empty containers are
    /// false, as is a missing field. Everything else is true.
    pub fn is_truthy(self) -> bool {
        match self {
            Field::Missing => false,
            Field::Present(value) => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Value::String(s) => !s.is_empty(),
                Value::Array(a) => !a.is_empty(),
                Value::Object(o) => !o.is_empty(),
            },
        }
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Human-readable JSON type name, used in diagnostics.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One parsed snapshot of the upstream `/debug/vars` page.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDocument {
    root: Map<String, Value>,
}

impl StatusDocument {
    /// Wrap a parsed JSON value. The root must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(Error::Document(format!(
                "root should be an object but is {}",
                value_kind(&other)
            ))),
        }
    }

    /// Parse a document from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Field<'_> {
        self.root.get(key).map_or(Field::Missing, Field::Present)
    }

    /// Look up a nested key, e.g. `["stats", "inbound"]`.
    pub fn lookup(&self, path: &[&str]) -> Field<'_> {
        let Some((first, rest)) = path.split_first() else {
            return Field::Missing;
        };
        rest.iter().fold(self.get(first), |field, key| field.get(key))
    }

    /// Resolve a keyed section map such as `observatory` or `stats.user`.
    ///
    /// Returns `Ok(None)` when any segment is absent or null, and an error
    /// naming the first segment that exists but is not an object.
    pub fn section(
        &self,
        path: &[&str],
    ) -> std::result::Result<Option<&Map<String, Value>>, FieldError> {
        let mut current = &self.root;
        for (depth, key) in path.iter().enumerate() {
            match current.get(*key) {
                None | Some(Value::Null) => return Ok(None),
                Some(Value::Object(map)) => current = map,
                Some(other) => {
                    return Err(FieldError::NotAnObject {
                        path: path[..=depth].join("."),
                        found: value_kind(other),
                    });
                }
            }
        }
        Ok(Some(current))
    }
}

impl FromStr for StatusDocument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_slice(s.as_bytes())
    }
}
