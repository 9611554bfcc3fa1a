use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devbench_core::{CoreConfig, StorageBackend};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file.
///
/// Every field is optional; anything left unset falls back to the
/// `DEVBENCH_*` environment and then to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Key prefix inside the storage medium
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StorageBackend>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Layer this file's settings over `base`.
    pub fn apply(&self, mut base: CoreConfig) -> CoreConfig {
        if let Some(ref dir) = self.data_dir {
            base.data_dir = dir.clone();
        }
        if let Some(ref namespace) = self.namespace {
            base.namespace = namespace.clone();
        }
        if let Some(backend) = self.backend {
            base.backend = backend;
        }
        base
    }
}

/// Resolve the effective core config: environment, then the optional
/// config file, then an explicit `--data-dir`.
pub fn resolve_config(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<CoreConfig> {
    let mut config = CoreConfig::from_env().context("Invalid DEVBENCH_* environment")?;
    if let Some(path) = config_path {
        config = CliConfig::load(path)?.apply(config);
    }
    if let Some(dir) = data_dir {
        config.data_dir = dir.to_path_buf();
    }
    Ok(config)
}
