//! The unified document store.
//!
//! A single JSON blob (`documents-v1`) holds every document plus the per-app
//! order and current pointer. Each public method locks the store, reads the
//! whole blob from storage, works on it and writes the whole blob back, so
//! callers can treat every method as one atomic step. Other handles on the
//! same storage (another process, the CLI) are seen on the next call.
//!
//! The decoded blob is kept next to the raw string it came from and only
//! re-parsed when storage holds something else. A failed write is logged and
//! returned as [`StoreError::Persist`]; the change is dropped, and the next
//! call sees what storage actually holds.

use super::legacy::LEGACY_APPS;
use super::migration::{self, MigrationReport};
use crate::config::{CoreConfig, StorageBackend};
use crate::constants::{MIGRATION_FLAG_KEY, STORE_KEY, STORE_SCHEMA_VERSION};
use crate::models::{generate_doc_id, DocUpdate, Document, NewDoc, StoreState};
use crate::substrate::{
    JsonFileMedium, KeyValueStore, MediumError, MemoryMedium, SqliteMedium, SubstrateError,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open storage: {0}")]
    Open(#[from] MediumError),

    #[error("change was not persisted: {0}")]
    Persist(#[from] SubstrateError),
}

/// Aggregate counts, for observability only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_docs: usize,
    pub per_app: BTreeMap<String, usize>,
    /// Size of the serialized store blob.
    pub approx_bytes: usize,
    /// Everything this namespace holds in the medium, legacy keys included.
    pub storage_bytes: usize,
}

/// A decoded blob and the stored string it was decoded from (`None` when
/// storage held nothing).
struct CachedState {
    raw: Option<String>,
    state: StoreState,
}

struct StoreInner {
    kv: KeyValueStore,
    cache: Option<CachedState>,
    migrated: bool,
}

impl StoreInner {
    /// Bring the cached blob in line with storage. If storage can't be read
    /// the last known state is used.
    fn load(&mut self) {
        match self.kv.get_raw(STORE_KEY) {
            Ok(raw) => {
                let unchanged = matches!(&self.cache, Some(cached) if cached.raw == raw);
                if !unchanged {
                    let state = decode_state(raw.as_deref());
                    self.cache = Some(CachedState { raw, state });
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot read document store, using last known state");
            }
        }
    }

    fn split(&mut self) -> (&KeyValueStore, &mut StoreState) {
        self.load();
        let kv = &self.kv;
        let cached = self.cache.get_or_insert_with(|| CachedState {
            raw: None,
            state: StoreState::default(),
        });
        (kv, &mut cached.state)
    }

    fn state(&mut self) -> &mut StoreState {
        self.split().1
    }

    /// Write the working blob back. On failure it is discarded so nothing
    /// unpersisted survives into the next call.
    fn commit(&mut self) -> Result<(), StoreError> {
        let Some(mut cached) = self.cache.take() else {
            return Ok(());
        };
        cached.raw = Some(self.kv.put(STORE_KEY, &cached.state)?);
        self.cache = Some(cached);
        Ok(())
    }
}

fn decode_state(raw: Option<&str>) -> StoreState {
    let Some(raw) = raw else {
        return StoreState::default();
    };
    let state: StoreState = match serde_json::from_str(raw) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "document store blob does not decode, starting empty");
            return StoreState::default();
        }
    };
    if state.version > STORE_SCHEMA_VERSION {
        tracing::warn!(
            found = state.version,
            supported = STORE_SCHEMA_VERSION,
            "document store was written by a newer version"
        );
    }
    state
}

pub struct DocumentStore {
    inner: Mutex<StoreInner>,
}

impl DocumentStore {
    pub fn new(kv: KeyValueStore) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                kv,
                cache: None,
                migrated: false,
            }),
        }
    }

    /// Open the store on the medium selected by `config`.
    pub fn open(config: &CoreConfig) -> Result<Self, StoreError> {
        let namespace = config.namespace.clone();
        let kv = match config.backend {
            StorageBackend::Memory => KeyValueStore::new(MemoryMedium::new(), namespace),
            StorageBackend::Json => {
                KeyValueStore::new(JsonFileMedium::open(&config.data_dir)?, namespace)
            }
            StorageBackend::Sqlite => {
                KeyValueStore::new(SqliteMedium::open(&config.data_dir)?, namespace)
            }
        };
        tracing::debug!(backend = %config.backend, data_dir = %config.data_dir.display(), "document store opened");
        Ok(Self::new(kv))
    }

    pub fn in_memory() -> Self {
        Self::new(KeyValueStore::new(
            MemoryMedium::new(),
            crate::constants::DEFAULT_NAMESPACE,
        ))
    }

    /// A copy of the whole store blob.
    pub fn snapshot(&self) -> StoreState {
        self.inner.lock().state().clone()
    }

    // ===== Query Methods =====

    pub fn list_docs(&self, app_id: &str) -> Vec<Document> {
        let mut inner = self.inner.lock();
        inner
            .state()
            .docs_for_app(app_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_doc(&self, id: &str) -> Option<Document> {
        self.inner.lock().state().docs_by_id.get(id).cloned()
    }

    /// The app's active document id. A pointer to a document that no longer
    /// exists (or belongs to another app) reads as `None`.
    pub fn get_current_id(&self, app_id: &str) -> Option<String> {
        self.inner
            .lock()
            .state()
            .current_id(app_id)
            .map(str::to_string)
    }

    pub fn list_all_recent_docs(&self, limit: usize) -> Vec<Document> {
        let mut inner = self.inner.lock();
        inner.state().recent(limit).into_iter().cloned().collect()
    }

    /// App ids that have an index entry, empty or not.
    pub fn list_apps(&self) -> Vec<String> {
        self.inner.lock().state().app_index.keys().cloned().collect()
    }

    pub fn get_stats(&self) -> StoreStats {
        let mut inner = self.inner.lock();
        let state = inner.state();

        let mut per_app = BTreeMap::new();
        for doc in state.docs_by_id.values() {
            *per_app.entry(doc.app_id.clone()).or_insert(0) += 1;
        }

        let total_docs = state.docs_by_id.len();
        let approx_bytes = serde_json::to_string(&*state).map(|s| s.len()).unwrap_or(0);

        StoreStats {
            total_docs,
            per_app,
            approx_bytes,
            storage_bytes: inner.kv.usage_bytes(),
        }
    }

    pub fn is_migrated(&self) -> bool {
        let inner = self.inner.lock();
        inner.migrated || inner.kv.get(MIGRATION_FLAG_KEY, false)
    }

    // ===== Mutation Methods =====

    /// Point `app_id` at `id` (or clear it with `None`).
    ///
    /// An id that isn't one of the app's live documents is rejected with
    /// `Ok(false)` and the pointer is left alone. An accepted id moves to the
    /// head of the app's order.
    pub fn set_current_id(&self, app_id: &str, id: Option<&str>) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let state = inner.state();

        match id {
            None => state.clear_current(app_id),
            Some(id) => {
                if !state.select(app_id, id) {
                    tracing::warn!(app_id, id, "refusing to select a document outside the app");
                    return Ok(false);
                }
            }
        }

        inner.commit()?;
        Ok(true)
    }

    /// Create a document with a collision-free title, put it at the head of
    /// its app and make it current.
    pub fn create_doc(&self, app_id: &str, new_doc: NewDoc) -> Result<Document, StoreError> {
        let mut inner = self.inner.lock();
        let state = inner.state();

        let now = Utc::now();
        let doc = Document {
            id: generate_doc_id(),
            app_id: app_id.to_string(),
            title: state.unique_title(app_id, &new_doc.title, None),
            content: new_doc.content,
            meta: new_doc.meta,
            created_at: now,
            updated_at: now,
        };
        state.insert_doc(doc.clone());
        tracing::debug!(app_id, id = %doc.id, title = %doc.title, "document created");

        inner.commit()?;
        Ok(doc)
    }

    /// Shallow-merge `update` into the document. A new title is
    /// de-duplicated like a rename. `Ok(None)` if `id` is unknown.
    pub fn update_doc(&self, id: &str, update: DocUpdate) -> Result<Option<Document>, StoreError> {
        let mut inner = self.inner.lock();
        let state = inner.state();

        let Some(existing) = state.docs_by_id.get(id) else {
            return Ok(None);
        };
        let title = match update.title.as_deref() {
            Some(title) if !same_title(title, &existing.title) => {
                Some(state.unique_title(&existing.app_id, title, Some(id)))
            }
            _ => None,
        };

        let Some(doc) = state.docs_by_id.get_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            doc.title = title;
        }
        if let Some(content) = update.content {
            doc.content = content;
        }
        if let Some(meta) = update.meta {
            doc.meta = meta;
        }
        doc.updated_at = update.updated_at.unwrap_or_else(Utc::now);
        let doc = doc.clone();

        inner.commit()?;
        Ok(Some(doc))
    }

    /// Rename within the document's app, suffixing on collision with another
    /// document. Renaming to the current title (in any case) is a no-op.
    pub fn rename_doc(&self, id: &str, new_title: &str) -> Result<Option<Document>, StoreError> {
        let mut inner = self.inner.lock();
        let state = inner.state();

        let Some(existing) = state.docs_by_id.get(id) else {
            return Ok(None);
        };
        if same_title(new_title, &existing.title) {
            return Ok(Some(existing.clone()));
        }
        let title = state.unique_title(&existing.app_id, new_title, Some(id));

        let Some(doc) = state.docs_by_id.get_mut(id) else {
            return Ok(None);
        };
        doc.title = title;
        doc.updated_at = Utc::now();
        let doc = doc.clone();

        inner.commit()?;
        Ok(Some(doc))
    }

    /// Remove a document. If it was current, the app's next document becomes
    /// current. `Ok(None)` if `id` is unknown.
    pub fn delete_doc(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(doc) = inner.state().remove_doc(id) else {
            return Ok(None);
        };
        tracing::debug!(app_id = %doc.app_id, id, "document deleted");

        inner.commit()?;
        Ok(Some(doc))
    }

    /// Import the legacy per-tool storage, at most once per physical storage.
    ///
    /// The completion flag is written after the store blob. If the blob
    /// can't be written nothing is imported and the flag stays unset, so a
    /// later call can retry.
    pub fn migrate_once(&self) -> Result<MigrationReport, StoreError> {
        let mut inner = self.inner.lock();
        if inner.migrated {
            return Ok(MigrationReport::not_run());
        }
        if inner.kv.get(MIGRATION_FLAG_KEY, false) {
            inner.migrated = true;
            return Ok(MigrationReport::not_run());
        }

        let report = {
            let (kv, state) = inner.split();
            migration::import_legacy(kv, state, LEGACY_APPS, Utc::now())
        };

        inner.commit()?;

        // The documents are persisted at this point; don't import them again
        // in this process even if the flag can't be written.
        inner.migrated = true;
        inner.kv.set(MIGRATION_FLAG_KEY, &true)?;
        Ok(report)
    }
}

fn same_title(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
