//! Per-instance view of the serialized backing column.

use log::warn;
use serde_json::{Map, Value as JsonValue};
use std::cell::OnceCell;
use std::collections::BTreeMap;

use crate::core::{Result, Value};

pub type JsonMap = Map<String, JsonValue>;

/// Lazily parsed contents of the backing column.
///
/// The cache holds raw JSON only. It is filled on first read and dropped by
/// [`BlobCache::invalidate`] whenever the column is rewritten.
#[derive(Debug, Default)]
pub struct BlobCache {
    parsed: OnceCell<JsonMap>,
}

impl BlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the parsed view, reading the column through `source` only when
    /// no view is cached. A failing `source` (column not loaded) is an empty blob.
    pub fn view<F>(&self, source: F) -> &JsonMap
    where
        F: FnOnce() -> Result<Value>,
    {
        self.parsed.get_or_init(|| match source() {
            Ok(value) => parse_blob(&value),
            Err(_) => JsonMap::new(),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.parsed.get().is_some()
    }

    pub fn invalidate(&mut self) {
        self.parsed.take();
    }
}

/// Parses a backing column value. Null, malformed JSON and non-object JSON
/// all read as an empty blob.
pub fn parse_blob(source: &Value) -> JsonMap {
    let text = match source {
        Value::Null => return JsonMap::new(),
        Value::Text(text) => text,
        other => {
            warn!(
                "metadata column holds a non-text value: type='{}'",
                other.type_name()
            );
            return JsonMap::new();
        }
    };

    if text.trim().is_empty() {
        return JsonMap::new();
    }

    match serde_json::from_str::<JsonValue>(text) {
        Ok(JsonValue::Object(map)) => map,
        Ok(other) => {
            warn!("metadata column is not a JSON object: value='{}'", other);
            JsonMap::new()
        }
        Err(err) => {
            warn!("metadata column could not be parsed: error='{}'", err);
            JsonMap::new()
        }
    }
}

/// Virtual fields written since the last save or reload.
///
/// Each entry keeps the raw value the field held at that point (`None` when
/// the key was absent from the blob).
#[derive(Debug, Default, Clone)]
pub struct PendingChanges {
    previous: BTreeMap<String, Option<JsonValue>>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write of `new` over `old`. The first prior value wins, and a
    /// write restoring that value drops the entry.
    pub fn record(&mut self, name: &str, old: Option<JsonValue>, new: &JsonValue) {
        match self.previous.get(name) {
            Some(original) if original.as_ref() == Some(new) => {
                self.previous.remove(name);
            }
            Some(_) => {}
            None => {
                self.previous.insert(name.to_string(), old);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.previous.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.previous.keys().map(String::as_str)
    }

    /// Prior values as attribute values; absent keys read as null.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.previous
            .iter()
            .map(|(name, old)| {
                let value = old.as_ref().map(Value::from_json).unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.previous.clear();
    }
}
