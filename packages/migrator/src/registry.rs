//! JSON key/value blobs stored in text columns (params, totals, product lists).
//!
//! Paths are dotted (`"login.code"`), intermediate objects are created on
//! `set`, and a `null` value counts as absent.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    data: Map<String, Value>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored blob. NULL and blank text are an empty registry; a
    /// top-level list is keyed by position.
    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        if blob.trim().is_empty() {
            return Ok(Self::new());
        }

        let data = match serde_json::from_str::<Value>(blob)? {
            Value::Object(map) => map,
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            Value::Null => Map::new(),
            scalar => {
                let mut map = Map::new();
                map.insert("0".to_string(), scalar);
                map
            }
        };

        Ok(Self { data })
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.data.get(first)?;
        for segment in segments {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        if node.is_null() {
            None
        } else {
            Some(node)
        }
    }

    pub fn set(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = match segments.pop() {
            Some(last) => last,
            None => return,
        };

        let mut node = &mut self.data;
        for segment in segments {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child {
                Value::Object(map) => map,
                _ => unreachable!("child was just made an object"),
            };
        }

        node.insert(last.to_string(), value);
    }

    /// Remove a path, returning the previous value.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop()?;

        let mut node = &mut self.data;
        for segment in segments {
            node = match node.get_mut(segment)? {
                Value::Object(map) => map,
                _ => return None,
            };
        }

        node.shift_remove(last)
    }

    /// Move `src` to `dest` for every pair whose source exists and whose
    /// destination does not. Returns how many keys moved.
    pub fn move_keys(&mut self, mapping: &[(&str, &str)]) -> usize {
        let mut moved = 0;
        for (src, dest) in mapping {
            if !self.exists(src) || self.exists(dest) {
                continue;
            }

            if let Some(value) = self.remove(src) {
                self.set(dest, value);
                moved += 1;
            }
        }
        moved
    }

    /// Top-level values in stored order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    pub fn to_blob(&self) -> String {
        Value::Object(self.data.clone()).to_string()
    }
}
