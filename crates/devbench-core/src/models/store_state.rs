//! The unified store blob and the pure operations on it.
//!
//! Everything here works on an in-memory `StoreState`; reading it from and
//! writing it back to the substrate is `DocumentStore`'s job.

use super::document::Document;
use crate::constants::{DEFAULT_DOC_TITLE, STORE_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

fn default_version() -> u32 {
    STORE_SCHEMA_VERSION
}

/// Per-app ordering and active-document pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIndex {
    /// Most recently created/selected first.
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub current_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub docs_by_id: HashMap<String, Document>,
    #[serde(default)]
    pub app_index: BTreeMap<String, AppIndex>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            version: STORE_SCHEMA_VERSION,
            docs_by_id: HashMap::new(),
            app_index: BTreeMap::new(),
        }
    }
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Query Methods =====

    pub fn index(&self, app_id: &str) -> Option<&AppIndex> {
        self.app_index.get(app_id)
    }

    /// Documents of `app_id` in index order. Ids with no backing document,
    /// or whose document belongs to another app, are skipped.
    pub fn docs_for_app(&self, app_id: &str) -> Vec<&Document> {
        let Some(index) = self.app_index.get(app_id) else {
            return Vec::new();
        };
        index
            .order
            .iter()
            .filter_map(|id| self.docs_by_id.get(id))
            .filter(|doc| doc.app_id == app_id)
            .collect()
    }

    /// The active pointer, or `None` when unset or dangling.
    pub fn current_id(&self, app_id: &str) -> Option<&str> {
        let current = self.app_index.get(app_id)?.current_id.as_deref()?;
        match self.docs_by_id.get(current) {
            Some(doc) if doc.app_id == app_id => Some(current),
            _ => None,
        }
    }

    /// All documents across apps, most recently updated first.
    pub fn recent(&self, limit: usize) -> Vec<&Document> {
        let mut docs: Vec<&Document> = self.docs_by_id.values().collect();
        docs.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        docs.truncate(limit);
        docs
    }

    /// Resolve `candidate` to a title no other document of `app_id` holds
    /// (case-insensitively), appending " (2)", " (3)", ... as needed.
    /// `exclude_id` is left out of the collision set (a rename's own doc).
    /// A free candidate is used verbatim; a blank one becomes "Untitled".
    pub fn unique_title(&self, app_id: &str, candidate: &str, exclude_id: Option<&str>) -> String {
        let base = if candidate.trim().is_empty() {
            DEFAULT_DOC_TITLE
        } else {
            candidate
        };

        let taken: HashSet<String> = self
            .docs_for_app(app_id)
            .into_iter()
            .filter(|doc| Some(doc.id.as_str()) != exclude_id)
            .map(|doc| doc.title.to_lowercase())
            .collect();

        if !taken.contains(&base.to_lowercase()) {
            return base.to_string();
        }

        let mut n = 2usize;
        loop {
            let title = format!("{} ({})", base, n);
            if !taken.contains(&title.to_lowercase()) {
                return title;
            }
            n += 1;
        }
    }

    // ===== Mutation Methods =====

    pub fn index_mut(&mut self, app_id: &str) -> &mut AppIndex {
        self.app_index.entry(app_id.to_string()).or_default()
    }

    /// Insert a new document at the head of its app's order and make it current.
    pub fn insert_doc(&mut self, doc: Document) {
        let id = doc.id.clone();
        let index = self.index_mut(&doc.app_id);
        index.order.retain(|existing| existing != &id);
        index.order.insert(0, id.clone());
        index.current_id = Some(id.clone());
        self.docs_by_id.insert(id, doc);
    }

    /// Point the app at `id` and move it to the head of the order.
    /// Returns false (and changes nothing) if `id` isn't one of the app's documents.
    pub fn select(&mut self, app_id: &str, id: &str) -> bool {
        let belongs = self
            .docs_by_id
            .get(id)
            .is_some_and(|doc| doc.app_id == app_id);
        let listed = self
            .app_index
            .get(app_id)
            .is_some_and(|index| index.order.iter().any(|existing| existing == id));
        if !belongs || !listed {
            return false;
        }

        let index = self.index_mut(app_id);
        index.order.retain(|existing| existing != id);
        index.order.insert(0, id.to_string());
        index.current_id = Some(id.to_string());
        true
    }

    pub fn clear_current(&mut self, app_id: &str) {
        self.index_mut(app_id).current_id = None;
    }

    /// Remove a document. If it was current, the new head of the order
    /// becomes current (or none when the app is now empty).
    pub fn remove_doc(&mut self, id: &str) -> Option<Document> {
        let doc = self.docs_by_id.remove(id)?;
        let index = self.index_mut(&doc.app_id);
        index.order.retain(|existing| existing != id);
        if index.current_id.as_deref() == Some(id) {
            index.current_id = index.order.first().cloned();
        }
        Some(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    fn doc(id: &str, app_id: &str, title: &str) -> Document {
        let now = Utc::now();
        Document {
            id: id.to_string(),
            app_id: app_id.to_string(),
            title: title.to_string(),
            content: Value::Null,
            meta: Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_prepends_and_selects() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "markdown", "A"));
        state.insert_doc(doc("b", "markdown", "B"));

        let index = state.index("markdown").unwrap();
        assert_eq!(index.order, vec!["b", "a"]);
        assert_eq!(state.current_id("markdown"), Some("b"));
    }

    #[test]
    fn test_docs_for_app_skips_dangling_ids() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "markdown", "A"));
        state.insert_doc(doc("other", "svg", "S"));
        state.index_mut("markdown").order.push("ghost".to_string());
        state.index_mut("markdown").order.push("other".to_string());

        let ids: Vec<&str> = state
            .docs_for_app("markdown")
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_unique_title_suffixes() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "markdown", "Doc"));
        state.insert_doc(doc("b", "markdown", "doc (2)"));

        assert_eq!(state.unique_title("markdown", "DOC", None), "DOC (3)");
        assert_eq!(state.unique_title("markdown", "Other", None), "Other");
        // Other apps don't collide
        assert_eq!(state.unique_title("svg", "Doc", None), "Doc");
        // The excluded doc's own title is free
        assert_eq!(state.unique_title("markdown", "doc", Some("a")), "doc");
    }

    #[test]
    fn test_unique_title_blank_uses_default() {
        let state = StoreState::new();
        assert_eq!(state.unique_title("markdown", "   ", None), "Untitled");
    }

    #[test]
    fn test_unique_title_keeps_candidate_verbatim() {
        let mut state = StoreState::new();
        assert_eq!(state.unique_title("markdown", " Draft  ", None), " Draft  ");

        state.insert_doc(doc("a", "markdown", "Draft"));
        assert_eq!(state.unique_title("markdown", "draft", None), "draft (2)");
    }

    #[test]
    fn test_remove_current_promotes_head() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "markdown", "A"));
        state.insert_doc(doc("b", "markdown", "B"));

        state.remove_doc("b").unwrap();
        assert_eq!(state.current_id("markdown"), Some("a"));

        state.remove_doc("a").unwrap();
        assert_eq!(state.current_id("markdown"), None);
        assert!(state.index("markdown").unwrap().order.is_empty());
        assert!(state.remove_doc("a").is_none());
    }

    #[test]
    fn test_remove_non_current_keeps_pointer() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "markdown", "A"));
        state.insert_doc(doc("b", "markdown", "B"));

        state.remove_doc("a").unwrap();
        assert_eq!(state.current_id("markdown"), Some("b"));
    }

    #[test]
    fn test_select_rejects_foreign_and_unknown_ids() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "markdown", "A"));
        state.insert_doc(doc("b", "markdown", "B"));
        state.insert_doc(doc("s", "svg", "S"));

        assert!(!state.select("markdown", "s"));
        assert!(!state.select("markdown", "missing"));
        assert_eq!(state.current_id("markdown"), Some("b"));

        assert!(state.select("markdown", "a"));
        assert_eq!(state.index("markdown").unwrap().order, vec!["a", "b"]);
        assert_eq!(state.current_id("markdown"), Some("a"));
    }

    #[test]
    fn test_dangling_current_reads_as_none() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "markdown", "A"));
        state.docs_by_id.remove("a");
        assert_eq!(state.current_id("markdown"), None);
    }

    #[test]
    fn test_recent_sorts_by_updated_desc() {
        let mut state = StoreState::new();
        let base = Utc::now();
        for (i, id) in ["old", "mid", "new"].iter().enumerate() {
            let mut d = doc(id, if i == 1 { "svg" } else { "markdown" }, id);
            d.updated_at = base + Duration::seconds(i as i64);
            state.insert_doc(d);
        }

        let ids: Vec<&str> = state.recent(2).iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_blob_shape() {
        let mut state = StoreState::new();
        state.insert_doc(doc("a", "tasks", "Task List"));

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["version"], json!(1));
        assert!(value["docsById"]["a"].is_object());
        assert_eq!(value["appIndex"]["tasks"]["order"], json!(["a"]));
        assert_eq!(value["appIndex"]["tasks"]["currentId"], json!("a"));
    }

    #[test]
    fn test_partial_blob_deserializes() {
        let state: StoreState = serde_json::from_value(json!({})).unwrap();
        assert_eq!(state.version, 1);
        assert!(state.docs_by_id.is_empty());
    }
}
