//! Tolerant field access over decoded JSON objects.
//!
//! Recorded CLI payloads mix naming conventions (`session_id`, `sessionId`,
//! `SessionId`). Lookups try the exact key first and then fall back to a
//! normalized comparison that ignores ASCII case, `_` and `-`. A `null` value
//! is treated the same as an absent key.
//!
//! Every failing accessor produces [`Error::MessageParse`] with the dotted path
//! of the field and the enclosing JSON document for diagnostics.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A view over one JSON object at a known path inside a larger document.
#[derive(Debug, Clone)]
pub(crate) struct Fields<'a> {
    obj: &'a Map<String, Value>,
    value: &'a Value,
    root: &'a Value,
    prefix: String,
}

impl<'a> Fields<'a> {
    /// View the top level of a document. Fails unless `root` is an object.
    pub fn root(root: &'a Value) -> Result<Self> {
        match root {
            Value::Object(obj) => Ok(Self {
                obj,
                value: root,
                root,
                prefix: String::new(),
            }),
            _ => Err(Error::invalid_field("<root>", "a JSON object", root)),
        }
    }

    /// The object this view wraps.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// The underlying map.
    pub fn map(&self) -> &'a Map<String, Value> {
        self.obj
    }

    /// Dotted path of `key` relative to the document root.
    pub fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.prefix)
        }
    }

    /// Look up a field, returning `None` for absent or `null` values.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        let found = match self.obj.get(key) {
            Some(v) => Some(v),
            None => {
                let wanted = normalize(key);
                self.obj
                    .iter()
                    .find(|(k, _)| normalize(k) == wanted)
                    .map(|(_, v)| v)
            }
        };
        found.filter(|v| !v.is_null())
    }

    /// Look up a required field.
    pub fn require(&self, key: &str) -> Result<&'a Value> {
        self.get(key)
            .ok_or_else(|| Error::missing_field(self.path(key), self.root))
    }

    pub fn str(&self, key: &str) -> Result<&'a str> {
        let v = self.require(key)?;
        v.as_str().ok_or_else(|| self.invalid(key, "a string"))
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a string")),
        }
    }

    pub fn u64(&self, key: &str) -> Result<u64> {
        let v = self.require(key)?;
        as_u64(v).ok_or_else(|| self.invalid(key, "a non-negative integer"))
    }

    pub fn opt_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => as_u64(v)
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a non-negative integer")),
        }
    }

    pub fn bool(&self, key: &str) -> Result<bool> {
        let v = self.require(key)?;
        v.as_bool().ok_or_else(|| self.invalid(key, "a boolean"))
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a boolean")),
        }
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "a number")),
        }
    }

    /// Descend into a required nested object.
    pub fn object(&self, key: &str) -> Result<Fields<'a>> {
        let v = self.require(key)?;
        self.nested(key, v)
    }

    /// Descend into an optional nested object.
    pub fn opt_object(&self, key: &str) -> Result<Option<Fields<'a>>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => self.nested(key, v).map(Some),
        }
    }

    /// View element `index` of the array stored under `key`.
    pub fn element(&self, key: &str, index: usize, v: &'a Value) -> Result<Fields<'a>> {
        let key = format!("{key}[{index}]");
        self.nested(&key, v)
    }

    pub fn array(&self, key: &str) -> Result<&'a Vec<Value>> {
        let v = self.require(key)?;
        v.as_array().ok_or_else(|| self.invalid(key, "an array"))
    }

    /// Build a parse error for `key` holding the wrong JSON kind.
    pub fn invalid(&self, key: &str, expected: &str) -> Error {
        Error::invalid_field(self.path(key), expected, self.root)
    }

    fn nested(&self, key: &str, v: &'a Value) -> Result<Fields<'a>> {
        match v {
            Value::Object(obj) => Ok(Fields {
                obj,
                value: v,
                root: self.root,
                prefix: self.path(key),
            }),
            _ => Err(self.invalid(key, "a JSON object")),
        }
    }
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| {
        v.as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

/// Normalize a key for case- and separator-insensitive comparison.
pub(crate) fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
