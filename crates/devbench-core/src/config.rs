use crate::constants::{env, DATA_DIR_NAME, DEFAULT_AUTOSAVE_DELAY_MS, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown storage backend {0:?} (expected memory, json or sqlite)")]
    UnknownBackend(String),

    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Which medium the document store persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Nothing survives the process; for tests and dry runs.
    Memory,
    #[default]
    Json,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub namespace: String,
    pub backend: StorageBackend,
    pub autosave_delay: Duration,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            backend: StorageBackend::default(),
            autosave_delay: Duration::from_millis(DEFAULT_AUTOSAVE_DELAY_MS),
        }
    }

    pub fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Defaults, overridden by `DEVBENCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(env::DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(namespace) = lookup(env::NAMESPACE).filter(|v| !v.trim().is_empty()) {
            config.namespace = namespace;
        }
        if let Some(backend) = lookup(env::BACKEND) {
            config.backend = backend.parse()?;
        }
        if let Some(ms) = lookup(env::AUTOSAVE_MS) {
            let ms: u64 = ms.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: env::AUTOSAVE_MS,
                value: ms.clone(),
            })?;
            config.autosave_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(DATA_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.namespace, "devbench");
        assert_eq!(config.backend, StorageBackend::Json);
        assert_eq!(config.autosave_delay, Duration::from_millis(500));
        assert!(config.data_dir.ends_with("devbench"));
    }

    #[test]
    fn test_env_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("DEVBENCH_DATA_DIR", "/tmp/bench"),
            ("DEVBENCH_NAMESPACE", "tools"),
            ("DEVBENCH_BACKEND", "SQLite"),
            ("DEVBENCH_AUTOSAVE_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/bench"));
        assert_eq!(config.namespace, "tools");
        assert_eq!(config.backend, StorageBackend::Sqlite);
        assert_eq!(config.autosave_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_bad_values_are_errors() {
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[("DEVBENCH_BACKEND", "redis")])),
            Err(ConfigError::UnknownBackend(_))
        ));
        assert!(matches!(
            CoreConfig::from_lookup(lookup(&[("DEVBENCH_AUTOSAVE_MS", "soon")])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_backend_round_trips_through_display() {
        for backend in [StorageBackend::Memory, StorageBackend::Json, StorageBackend::Sqlite] {
            assert_eq!(backend.to_string().parse::<StorageBackend>().unwrap(), backend);
        }
    }
}
