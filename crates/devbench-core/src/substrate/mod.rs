//! Namespaced JSON key/value layer over a raw storage medium.
//!
//! Nothing in here panics or propagates a read failure: a key that can't be
//! read or decoded behaves as if it were absent. Writes report failure as an
//! explicit `Err` so callers know the value did not land, and every failure
//! is logged where it happens.

pub mod json_file;
pub mod medium;
pub mod memory;
pub mod sqlite;

pub use json_file::JsonFileMedium;
pub use medium::{MediumError, StorageMedium};
pub use memory::MemoryMedium;
pub use sqlite::SqliteMedium;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum SubstrateError {
    #[error("cannot serialize value for {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },

    #[error("cannot write {key}: {source}")]
    Write { key: String, source: MediumError },

    #[error("cannot remove {key}: {source}")]
    Remove { key: String, source: MediumError },
}

pub struct KeyValueStore {
    medium: Box<dyn StorageMedium>,
    namespace: String,
}

impl KeyValueStore {
    pub fn new<M: StorageMedium + 'static>(medium: M, namespace: impl Into<String>) -> Self {
        Self {
            medium: Box::new(medium),
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.medium.read(&self.physical_key(key)) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    /// Decode `key`, or `default` if it is absent or doesn't decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).unwrap_or(default)
    }

    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value does not decode, ignoring");
                None
            }
        }
    }

    /// The stored JSON without committing to a shape.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.get_opt(key)
    }

    /// The stored string for `key`, distinguishing "absent" from "unreadable".
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, MediumError> {
        self.medium.read(&self.physical_key(key))
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), SubstrateError> {
        self.put(key, value).map(|_| ())
    }

    /// Like [`KeyValueStore::set`], returning the exact string that landed
    /// in storage.
    pub fn put<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<String, SubstrateError> {
        let json = serde_json::to_string(value).map_err(|source| {
            tracing::error!(key, error = %source, "cannot serialize value");
            SubstrateError::Serialize {
                key: key.to_string(),
                source,
            }
        })?;

        let physical = self.physical_key(key);
        self.medium.write(&physical, &json).map_err(|source| {
            tracing::error!(key, bytes = json.len(), error = %source, "storage write failed");
            SubstrateError::Write {
                key: key.to_string(),
                source,
            }
        })?;
        Ok(json)
    }

    pub fn remove(&mut self, key: &str) -> Result<(), SubstrateError> {
        let physical = self.physical_key(key);
        self.medium.delete(&physical).map_err(|source| {
            tracing::warn!(key, error = %source, "storage remove failed");
            SubstrateError::Remove {
                key: key.to_string(),
                source,
            }
        })
    }

    pub fn has(&self, key: &str) -> bool {
        self.read_raw(key).is_some()
    }

    /// Keys inside this namespace, with the prefix stripped.
    pub fn keys(&self) -> Vec<String> {
        let prefix = format!("{}:", self.namespace);
        match self.medium.keys() {
            Ok(keys) => {
                let mut keys: Vec<String> = keys
                    .into_iter()
                    .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
                    .collect();
                keys.sort();
                keys
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot list storage keys");
                Vec::new()
            }
        }
    }

    pub fn usage_bytes(&self) -> usize {
        self.medium.usage_bytes().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot measure storage usage");
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kv() -> (KeyValueStore, MemoryMedium) {
        let medium = MemoryMedium::new();
        (KeyValueStore::new(medium.clone(), "devbench"), medium)
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (mut kv, medium) = kv();
        let value = json!({"a": [1, 2, {"b": null}], "c": "text", "d": 1.5, "e": true});

        kv.set("thing", &value).unwrap();

        assert_eq!(kv.get("thing", Value::Null), value);
        assert!(medium.raw("devbench:thing").is_some());
        assert!(kv.has("thing"));
    }

    #[test]
    fn test_get_missing_returns_default() {
        let (kv, _) = kv();
        assert_eq!(kv.get("missing", 42u32), 42);
        assert!(!kv.has("missing"));
    }

    #[test]
    fn test_corrupted_value_returns_default() {
        let (kv, medium) = kv();
        medium.insert_raw("devbench:broken", "{not json");

        assert_eq!(kv.get("broken", json!("fallback")), json!("fallback"));
        assert_eq!(kv.get_value("broken"), None);
    }

    #[test]
    fn test_wrong_shape_returns_default() {
        let (mut kv, _) = kv();
        kv.set("n", "not a number").unwrap();
        assert_eq!(kv.get("n", 7i64), 7);
    }

    #[test]
    fn test_failed_write_reports_error() {
        let (mut kv, medium) = kv();
        medium.set_quota(Some(4));

        let result = kv.set("big", &"x".repeat(100));
        assert!(matches!(result, Err(SubstrateError::Write { .. })));
        assert_eq!(kv.get("big", String::new()), "");
    }

    #[test]
    fn test_unavailable_storage_degrades_to_absent() {
        let (mut kv, medium) = kv();
        kv.set("k", &1).unwrap();
        medium.set_unavailable(true);

        assert_eq!(kv.get("k", 0), 0);
        assert!(!kv.has("k"));
        assert!(kv.keys().is_empty());
        assert_eq!(kv.usage_bytes(), 0);
        assert!(kv.remove("k").is_err());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let medium = MemoryMedium::new();
        let mut a = KeyValueStore::new(medium.clone(), "a");
        let b = KeyValueStore::new(medium.clone(), "b");
        medium.insert_raw("unrelated", "1");

        a.set("shared", &"from a").unwrap();

        assert_eq!(b.get_opt::<String>("shared"), None);
        assert_eq!(a.keys(), vec!["shared".to_string()]);
    }

    #[test]
    fn test_put_returns_stored_string() {
        let (mut kv, medium) = kv();
        let written = kv.put("k", &json!({"a": 1})).unwrap();
        assert_eq!(medium.raw("devbench:k"), Some(written.clone()));
        assert_eq!(kv.get_raw("k").unwrap(), Some(written));
        assert_eq!(kv.get_raw("absent").unwrap(), None);

        medium.set_unavailable(true);
        assert!(kv.get_raw("k").is_err());
    }

    #[test]
    fn test_remove() {
        let (mut kv, _) = kv();
        kv.set("k", &true).unwrap();
        kv.remove("k").unwrap();
        assert!(!kv.has("k"));
        kv.remove("k").unwrap();
    }
}
