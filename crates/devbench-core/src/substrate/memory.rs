use super::medium::{MediumError, StorageMedium};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, String>,
    quota: Option<usize>,
    unavailable: bool,
    writes: HashMap<String, usize>,
}

impl MemoryState {
    fn usage_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

/// In-process medium. Clones share the same map, so a test can keep a
/// handle and inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium that refuses writes pushing total usage past `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        let medium = Self::new();
        medium.inner.lock().quota = Some(quota);
        medium
    }

    pub fn set_quota(&self, quota: Option<usize>) {
        self.inner.lock().quota = quota;
    }

    /// Simulate storage being disabled: every operation fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Store a raw physical entry, bypassing quota and availability.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .entries
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Number of successful writes to a physical key.
    pub fn write_count(&self, key: &str) -> usize {
        self.inner.lock().writes.get(key).copied().unwrap_or(0)
    }
}

impl StorageMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        let state = self.inner.lock();
        if state.unavailable {
            return Err(MediumError::Unavailable);
        }
        Ok(state.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut state = self.inner.lock();
        if state.unavailable {
            return Err(MediumError::Unavailable);
        }
        if let Some(quota) = state.quota {
            let needed = state.usage_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(MediumError::QuotaExceeded { needed, quota });
            }
        }
        state.entries.insert(key.to_string(), value.to_string());
        *state.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), MediumError> {
        let mut state = self.inner.lock();
        if state.unavailable {
            return Err(MediumError::Unavailable);
        }
        state.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        let state = self.inner.lock();
        if state.unavailable {
            return Err(MediumError::Unavailable);
        }
        Ok(state.entries.keys().cloned().collect())
    }
}
