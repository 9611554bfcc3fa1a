//! Binds one tool to its current document.
//!
//! The session keeps an editable copy of the current document's content.
//! Edits schedule a debounced write; the owning event loop calls
//! [`DocumentSession::poll`] and the write lands once the edits have been
//! quiet for the autosave delay. Any operation that changes which document
//! is current flushes a pending write first, so edits always land on the
//! document they were made in.

use super::debounce::{Clock, Debouncer, SystemClock};
use super::normalize::normalize_content;
use crate::config::CoreConfig;
use crate::constants::DEFAULT_AUTOSAVE_DELAY_MS;
use crate::models::{DocUpdate, Document, NewDoc};
use crate::store::{DocumentStore, StoreError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub app_id: String,
    pub default_title: String,
    /// Canonical content shape; seeds first-run documents and fills gaps
    /// in older stored content.
    pub initial_content: Value,
    /// Attached to documents this session creates.
    pub meta: Option<Value>,
    pub autosave_delay: Duration,
}

impl SessionOptions {
    pub fn new(
        app_id: impl Into<String>,
        default_title: impl Into<String>,
        initial_content: Value,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            default_title: default_title.into(),
            initial_content,
            meta: None,
            autosave_delay: Duration::from_millis(DEFAULT_AUTOSAVE_DELAY_MS),
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_autosave_delay(mut self, delay: Duration) -> Self {
        self.autosave_delay = delay;
        self
    }

    /// Take the deployment-wide settings (`DEVBENCH_AUTOSAVE_MS`) from `config`.
    pub fn with_config(self, config: &CoreConfig) -> Self {
        self.with_autosave_delay(config.autosave_delay)
    }
}

pub struct DocumentSession<C: Clock = SystemClock> {
    store: Arc<DocumentStore>,
    options: SessionOptions,
    clock: C,
    docs: Vec<Document>,
    current: Option<Document>,
    content: Value,
    autosave: Debouncer,
    /// Document the pending write belongs to.
    pending_doc: Option<String>,
}

impl DocumentSession<SystemClock> {
    pub fn open(store: Arc<DocumentStore>, options: SessionOptions) -> Self {
        Self::with_clock(store, options, SystemClock)
    }
}

impl<C: Clock> DocumentSession<C> {
    /// Activate the session: run the legacy migration if this store hasn't
    /// yet, make sure the app has a document, and load the current one.
    pub fn with_clock(store: Arc<DocumentStore>, options: SessionOptions, clock: C) -> Self {
        if let Err(e) = store.migrate_once() {
            tracing::error!(app_id = %options.app_id, error = %e, "legacy migration failed");
        }

        let mut session = Self {
            autosave: Debouncer::new(options.autosave_delay),
            content: options.initial_content.clone(),
            store,
            options,
            clock,
            docs: Vec::new(),
            current: None,
            pending_doc: None,
        };
        session.refresh();
        session
    }

    // ===== Getters =====

    pub fn app_id(&self) -> &str {
        &self.options.app_id
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn current_doc(&self) -> Option<&Document> {
        self.current.as_ref()
    }

    pub fn current_doc_id(&self) -> Option<&str> {
        self.current.as_ref().map(|doc| doc.id.as_str())
    }

    /// True while an edit is waiting for its debounced write.
    pub fn is_saving(&self) -> bool {
        self.autosave.is_pending()
    }

    /// How long the event loop may sleep before the pending write is due.
    pub fn time_until_save(&self) -> Option<Duration> {
        self.autosave.remaining(self.clock.now())
    }

    // ===== Editing =====

    pub fn set_content(&mut self, content: Value) {
        self.content = content;
        self.schedule_save();
    }

    pub fn update_content(&mut self, update: impl FnOnce(&mut Value)) {
        update(&mut self.content);
        self.schedule_save();
    }

    fn schedule_save(&mut self) {
        let Some(id) = self.current_doc_id().map(str::to_string) else {
            return;
        };
        self.pending_doc = Some(id);
        self.autosave.schedule(self.clock.now());
    }

    /// Drive the autosave timer. Returns true if a write was attempted.
    pub fn poll(&mut self) -> bool {
        if !self.autosave.fire_if_due(self.clock.now()) {
            return false;
        }
        self.write_pending();
        true
    }

    /// Write a pending edit now instead of waiting for the timer.
    pub fn flush(&mut self) {
        if self.autosave.is_pending() {
            self.autosave.cancel();
            self.write_pending();
        }
    }

    fn write_pending(&mut self) {
        let Some(id) = self.pending_doc.take() else {
            return;
        };

        match self
            .store
            .update_doc(&id, DocUpdate::content(self.content.clone()))
        {
            Ok(Some(doc)) => {
                tracing::debug!(app_id = %self.options.app_id, id = %doc.id, "autosaved");
                if let Some(slot) = self.docs.iter_mut().find(|d| d.id == doc.id) {
                    *slot = doc.clone();
                }
                if self.current_doc_id() == Some(doc.id.as_str()) {
                    self.current = Some(doc);
                }
            }
            Ok(None) => {
                tracing::warn!(app_id = %self.options.app_id, id = %id, "autosave target no longer exists");
            }
            Err(e) => {
                tracing::error!(app_id = %self.options.app_id, id = %id, error = %e, "autosave not persisted");
            }
        }
    }

    // ===== Document Operations =====

    /// Switch to another document of this app. Returns false if `id` isn't one.
    pub fn set_current_doc_id(&mut self, id: &str) -> bool {
        self.flush();
        let switched = match self.store.set_current_id(&self.options.app_id, Some(id)) {
            Ok(switched) => switched,
            Err(e) => {
                self.log_store_error("select", &e);
                true
            }
        };
        self.refresh();
        switched
    }

    /// Create a document (seeded with the tool's initial content unless
    /// given) and switch to it.
    pub fn create_doc(&mut self, title: &str, content: Option<Value>) -> Option<&Document> {
        self.flush();
        let content = content.unwrap_or_else(|| self.options.initial_content.clone());
        let new_doc = NewDoc::new(title, content)
            .with_meta(self.options.meta.clone().unwrap_or(Value::Null));
        if let Err(e) = self.store.create_doc(&self.options.app_id, new_doc) {
            self.log_store_error("create", &e);
        }
        self.refresh();
        self.current.as_ref()
    }

    /// Duplicate the current content (and meta) under `title` and switch to it.
    pub fn save_as(&mut self, title: &str) -> Option<&Document> {
        self.flush();
        let meta = self
            .current
            .as_ref()
            .map(|doc| doc.meta.clone())
            .filter(|meta| !meta.is_null())
            .or_else(|| self.options.meta.clone())
            .unwrap_or(Value::Null);
        let new_doc = NewDoc::new(title, self.content.clone()).with_meta(meta);
        if let Err(e) = self.store.create_doc(&self.options.app_id, new_doc) {
            self.log_store_error("save as", &e);
        }
        self.refresh();
        self.current.as_ref()
    }

    pub fn rename_doc(&mut self, title: &str) -> Option<&Document> {
        self.flush();
        let id = self.current_doc_id()?.to_string();
        if let Err(e) = self.store.rename_doc(&id, title) {
            self.log_store_error("rename", &e);
        }
        self.refresh();
        self.current.as_ref()
    }

    /// Delete `id`, or the current document when `None`. Deleting the last
    /// document re-seeds the app with its initial content.
    pub fn delete_doc(&mut self, id: Option<&str>) -> bool {
        self.flush();
        let Some(id) = id
            .map(str::to_string)
            .or_else(|| self.current_doc_id().map(str::to_string))
        else {
            return false;
        };

        let deleted = match self.store.delete_doc(&id) {
            Ok(deleted) => deleted.is_some(),
            Err(e) => {
                self.log_store_error("delete", &e);
                true
            }
        };
        self.refresh();
        deleted
    }

    /// Re-read the document list and current document from the store.
    /// Content is reloaded only when the current document changed.
    pub fn refresh(&mut self) {
        self.ensure_current();

        let app_id = self.options.app_id.as_str();
        self.docs = self.store.list_docs(app_id);
        let current = self
            .store
            .get_current_id(app_id)
            .and_then(|id| self.store.get_doc(&id));

        let switched = current.as_ref().map(|d| d.id.as_str()) != self.current_doc_id();
        self.current = current;
        if switched {
            self.load_current();
        }
    }

    /// An app is never left without a current document.
    fn ensure_current(&mut self) {
        let app_id = self.options.app_id.clone();
        let docs = self.store.list_docs(&app_id);

        if docs.is_empty() {
            let new_doc = NewDoc::new(
                self.options.default_title.clone(),
                self.options.initial_content.clone(),
            )
            .with_meta(self.options.meta.clone().unwrap_or(Value::Null));
            tracing::debug!(app_id = %app_id, "seeding first document");
            if let Err(e) = self.store.create_doc(&app_id, new_doc) {
                self.log_store_error("seed", &e);
            }
            return;
        }

        if self.store.get_current_id(&app_id).is_none() {
            if let Err(e) = self.store.set_current_id(&app_id, Some(&docs[0].id)) {
                self.log_store_error("select", &e);
            }
        }
    }

    fn load_current(&mut self) {
        self.autosave.cancel();
        self.pending_doc = None;
        self.content = normalize_content(
            &self.options.initial_content,
            self.current.as_ref().map(|doc| &doc.content),
        );
    }

    fn log_store_error(&self, op: &str, error: &StoreError) {
        tracing::error!(app_id = %self.options.app_id, op, error = %error, "document store change not persisted");
    }
}

impl<C: Clock> Drop for DocumentSession<C> {
    fn drop(&mut self) {
        self.flush();
    }
}
