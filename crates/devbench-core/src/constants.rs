//! Application-wide constants
//!
//! Storage key names and defaults shared by the store, the migration
//! routine, and the CLI.

/// Namespace prefix applied to every physical storage key
pub const DEFAULT_NAMESPACE: &str = "devbench";

/// Subdirectory under the platform data dir
pub const DATA_DIR_NAME: &str = "devbench";

/// Key holding the unified document store blob
pub const STORE_KEY: &str = "documents-v1";

/// Key holding the one-shot legacy migration flag
pub const MIGRATION_FLAG_KEY: &str = "documents-migrated-v1";

/// Schema version written into the store blob
pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Autosave debounce applied when a session doesn't pick its own
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 500;

/// Title used when a caller passes an empty one
pub const DEFAULT_DOC_TITLE: &str = "Untitled";

/// Prefix for generated document ids
pub const DOC_ID_PREFIX: &str = "doc";

/// Limit used by the "recently edited" view when none is given
pub const DEFAULT_RECENT_LIMIT: usize = 10;

// Environment overrides for CoreConfig
pub mod env {
    pub const DATA_DIR: &str = "DEVBENCH_DATA_DIR";
    pub const NAMESPACE: &str = "DEVBENCH_NAMESPACE";
    pub const BACKEND: &str = "DEVBENCH_BACKEND";
    pub const AUTOSAVE_MS: &str = "DEVBENCH_AUTOSAVE_MS";
    pub const LOG_FILE: &str = "DEVBENCH_LOG_FILE";
}

// File names inside the data dir
pub mod files {
    /// JSON file backing `JsonFileMedium`
    pub const JSON_STORAGE: &str = "storage.json";
    /// SQLite database backing `SqliteMedium`
    pub const SQLITE_STORAGE: &str = "devbench.db";
}
