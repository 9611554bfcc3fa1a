//! Single-file JSON medium.
//!
//! The whole key space lives in one JSON object file. Every operation reads
//! the file, so handles in other processes (or other handles in this one)
//! see each other's writes. Mutations rewrite the file with a
//! write-to-temp-then-rename so a crash mid-write never leaves a truncated
//! file behind.

use super::medium::{MediumError, StorageMedium};
use crate::constants::files;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonFileMedium {
    path: PathBuf,
}

impl JsonFileMedium {
    /// Open (or start) `storage.json` inside `data_dir`.
    ///
    /// A missing file is an empty medium. A corrupt file is logged and also
    /// treated as empty; it is only replaced on the next write.
    pub fn open(data_dir: &Path) -> Result<Self, MediumError> {
        fs::create_dir_all(data_dir).map_err(|source| MediumError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let medium = Self {
            path: data_dir.join(files::JSON_STORAGE),
        };
        // Surface permission problems at open rather than on first use
        medium.load()?;
        Ok(medium)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, MediumError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "storage file is corrupt, treating as empty");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(MediumError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), MediumError> {
        let json = serde_json::to_string_pretty(entries).map_err(|source| MediumError::Json {
            path: self.path.clone(),
            source,
        })?;

        let temp_file = self.path.with_extension("json.tmp");
        fs::write(&temp_file, json).map_err(|source| MediumError::Io {
            path: temp_file.clone(),
            source,
        })?;
        fs::rename(&temp_file, &self.path).map_err(|source| MediumError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl StorageMedium for JsonFileMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(self.load()?.remove(key))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn delete(&mut self, key: &str) -> Result<(), MediumError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries)
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        Ok(self.load()?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut medium = JsonFileMedium::open(dir.path()).unwrap();
            medium.write("devbench:a", "\"one\"").unwrap();
            medium.write("devbench:b", "2").unwrap();
            medium.delete("devbench:b").unwrap();
        }

        let medium = JsonFileMedium::open(dir.path()).unwrap();
        assert_eq!(medium.read("devbench:a").unwrap(), Some("\"one\"".to_string()));
        assert_eq!(medium.read("devbench:b").unwrap(), None);
        assert!(!dir.path().join("storage.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(files::JSON_STORAGE), "{not json").unwrap();

        let mut medium = JsonFileMedium::open(dir.path()).unwrap();
        assert!(medium.keys().unwrap().is_empty());

        medium.write("k", "v").unwrap();
        let medium = JsonFileMedium::open(dir.path()).unwrap();
        assert_eq!(medium.read("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_handles_on_one_directory_see_each_other() {
        let dir = tempdir().unwrap();
        let mut a = JsonFileMedium::open(dir.path()).unwrap();
        let mut b = JsonFileMedium::open(dir.path()).unwrap();

        a.write("one", "1").unwrap();
        assert_eq!(b.read("one").unwrap(), Some("1".to_string()));

        b.write("two", "2").unwrap();
        a.write("three", "3").unwrap();
        assert_eq!(b.keys().unwrap(), vec!["one", "three", "two"]);
    }

    #[test]
    fn test_delete_missing_key_is_ok() {
        let dir = tempdir().unwrap();
        let mut medium = JsonFileMedium::open(dir.path()).unwrap();
        medium.delete("never-written").unwrap();
        assert!(!medium.path().exists());
    }
}
