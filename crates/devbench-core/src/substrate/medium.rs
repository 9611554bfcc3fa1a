use std::path::PathBuf;

/// Failure of the raw storage medium underneath the key/value layer.
#[derive(Debug, thiserror::Error)]
pub enum MediumError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("storage unavailable")]
    Unavailable,

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json error at {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// A synchronous, string-keyed, string-valued persistent medium.
///
/// Keys are physical keys: namespacing happens one layer up in
/// [`super::KeyValueStore`].
pub trait StorageMedium: Send {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError>;

    fn write(&mut self, key: &str, value: &str) -> Result<(), MediumError>;

    /// Removing an absent key is not an error.
    fn delete(&mut self, key: &str) -> Result<(), MediumError>;

    fn keys(&self) -> Result<Vec<String>, MediumError>;

    /// Approximate bytes held (keys plus values).
    fn usage_bytes(&self) -> Result<usize, MediumError> {
        let mut total = 0;
        for key in self.keys()? {
            total += key.len();
            total += self.read(&key)?.map(|v| v.len()).unwrap_or(0);
        }
        Ok(total)
    }
}
