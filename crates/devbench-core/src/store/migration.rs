//! One-shot import of legacy per-tool storage into the unified store.
//!
//! Each legacy shape of each tool is imported on its own: a malformed value
//! is logged and skipped without affecting the others. Legacy ids are only
//! used to correlate the old "current file" pointer; every imported document
//! gets a fresh id.

use super::legacy::{scalar_id, FlatShape, LegacyApp, LegacyFileRecord};
use crate::models::{generate_doc_id, Document, StoreState};
use crate::substrate::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// False when the completion flag was already set.
    pub ran: bool,
    /// Documents imported from legacy file lists.
    pub imported: usize,
    /// Documents synthesized from flat "current content" keys.
    pub synthesized: usize,
    /// Legacy records or values that could not be imported.
    pub skipped: usize,
    pub per_app: BTreeMap<String, usize>,
}

impl MigrationReport {
    pub fn not_run() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.imported + self.synthesized
    }

    fn count(&mut self, app_id: &str) {
        *self.per_app.entry(app_id.to_string()).or_insert(0) += 1;
    }
}

/// Import every known legacy shape into `state`.
pub fn import_legacy(
    kv: &KeyValueStore,
    state: &mut StoreState,
    apps: &[LegacyApp],
    now: DateTime<Utc>,
) -> MigrationReport {
    let mut report = MigrationReport {
        ran: true,
        ..Default::default()
    };

    for app in apps {
        let previous_current = state.current_id(app.app_id).map(str::to_string);
        let id_map = import_files(kv, state, app, now, &mut report);
        resolve_current(kv, state, app, &id_map, previous_current);
        import_flat(kv, state, app, now, &mut report);
    }

    tracing::info!(
        imported = report.imported,
        synthesized = report.synthesized,
        skipped = report.skipped,
        "legacy migration finished"
    );
    report
}

/// Returns legacy id -> new id for the records that were imported.
fn import_files(
    kv: &KeyValueStore,
    state: &mut StoreState,
    app: &LegacyApp,
    now: DateTime<Utc>,
    report: &mut MigrationReport,
) -> HashMap<String, String> {
    let mut id_map = HashMap::new();
    let Some(key) = app.files_key else {
        return id_map;
    };

    let records = match kv.get_value(key) {
        None | Some(Value::Null) => return id_map,
        Some(Value::Array(records)) => records,
        Some(other) => {
            tracing::warn!(key, kind = value_kind(&other), "legacy files list is not an array, skipping");
            report.skipped += 1;
            return id_map;
        }
    };

    let mut new_ids = Vec::with_capacity(records.len());
    for (position, raw) in records.iter().enumerate() {
        let Some(record) = LegacyFileRecord::from_value(raw) else {
            tracing::warn!(key, position, "legacy file record is not an object, skipping");
            report.skipped += 1;
            continue;
        };

        let id = generate_doc_id();
        let title = state.unique_title(
            app.app_id,
            record.name.as_deref().unwrap_or(app.default_title),
            None,
        );
        let created_at = record.created_at.or(record.updated_at).unwrap_or(now);
        let updated_at = record.updated_at.unwrap_or(created_at);
        let meta = match record.language {
            Some(language) => json!({ "language": language }),
            None => Value::Null,
        };

        state.insert_doc(Document {
            id: id.clone(),
            app_id: app.app_id.to_string(),
            title,
            content: record.content,
            meta,
            created_at,
            updated_at,
        });

        if let Some(legacy_id) = record.legacy_id {
            id_map.entry(legacy_id).or_insert_with(|| id.clone());
        }
        new_ids.push(id);
        report.imported += 1;
        report.count(app.app_id);
    }

    // insert_doc prepends; restore the legacy list order at the head
    let index = state.index_mut(app.app_id);
    let rest: Vec<String> = std::mem::take(&mut index.order)
        .into_iter()
        .filter(|existing| !new_ids.contains(existing))
        .collect();
    index.order = new_ids;
    index.order.extend(rest);

    id_map
}

fn resolve_current(
    kv: &KeyValueStore,
    state: &mut StoreState,
    app: &LegacyApp,
    id_map: &HashMap<String, String>,
    previous_current: Option<String>,
) {
    if id_map.is_empty() && state.index(app.app_id).is_none() {
        return;
    }

    let legacy_current = app
        .current_id_key
        .and_then(|key| kv.get_value(key))
        .as_ref()
        .and_then(scalar_id);
    let mapped = legacy_current.and_then(|legacy| id_map.get(&legacy).cloned());

    let next = mapped
        .or(previous_current)
        .or_else(|| state.index(app.app_id)?.order.first().cloned());
    state.index_mut(app.app_id).current_id = next;
}

fn import_flat(
    kv: &KeyValueStore,
    state: &mut StoreState,
    app: &LegacyApp,
    now: DateTime<Utc>,
    report: &mut MigrationReport,
) {
    let Some(key) = app.flat_key else {
        return;
    };
    let Some(raw) = kv.get_value(key) else {
        return;
    };

    let content = match (app.flat_shape, raw) {
        (_, Value::Null) => return,
        (FlatShape::Text, Value::String(text)) => {
            if text.trim().is_empty() {
                return;
            }
            Value::String(text)
        }
        (FlatShape::List { wrap_key }, Value::Array(items)) => {
            if items.is_empty() {
                return;
            }
            json!({ wrap_key: items })
        }
        (_, other) => {
            tracing::warn!(key, kind = value_kind(&other), "legacy flat value has unexpected shape, skipping");
            report.skipped += 1;
            return;
        }
    };

    let duplicate = state
        .docs_for_app(app.app_id)
        .iter()
        .any(|doc| content_matches(&doc.content, &content));
    if duplicate {
        tracing::debug!(key, app_id = app.app_id, "flat legacy content already imported");
        return;
    }

    let had_docs = !state.docs_for_app(app.app_id).is_empty();
    let previous_current = state.current_id(app.app_id).map(str::to_string);
    let id = generate_doc_id();
    let title = state.unique_title(app.app_id, app.default_title, None);

    state.insert_doc(Document {
        id: id.clone(),
        app_id: app.app_id.to_string(),
        title,
        content,
        meta: Value::Null,
        created_at: now,
        updated_at: now,
    });

    // Alongside migrated files the synthesized doc goes last and doesn't
    // take over the migrated current pointer
    if had_docs {
        let index = state.index_mut(app.app_id);
        index.order.retain(|existing| existing != &id);
        index.order.push(id.clone());
        index.current_id = previous_current.or(Some(id));
    }

    report.synthesized += 1;
    report.count(app.app_id);
}

/// Structural equality, also treating a one-field text wrapper as equal to
/// the bare string it wraps.
fn content_matches(existing: &Value, candidate: &Value) -> bool {
    if existing == candidate {
        return true;
    }
    match (existing, candidate) {
        (Value::Object(map), Value::String(_)) | (Value::String(_), Value::Object(map))
            if map.len() == 1 =>
        {
            let inner = map.values().next();
            let bare = if existing.is_string() { existing } else { candidate };
            inner == Some(bare)
        }
        _ => false,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::legacy::LEGACY_APPS;
    use crate::substrate::MemoryMedium;

    fn seeded(entries: &[(&str, Value)]) -> KeyValueStore {
        let mut kv = KeyValueStore::new(MemoryMedium::new(), "devbench");
        for (key, value) in entries {
            kv.set(key, value).unwrap();
        }
        kv
    }

    fn titles(state: &StoreState, app_id: &str) -> Vec<String> {
        state
            .docs_for_app(app_id)
            .iter()
            .map(|d| d.title.clone())
            .collect()
    }

    #[test]
    fn test_files_list_imported_in_order_with_current() {
        let kv = seeded(&[
            (
                "markdown-files",
                json!([
                    {"id": "f1", "name": "First", "content": "one", "createdAt": "2023-01-01T00:00:00Z", "updatedAt": "2023-01-02T00:00:00Z"},
                    {"id": "f2", "name": "Second", "content": "two"}
                ]),
            ),
            ("markdown-current-file", json!("f2")),
        ]);
        let mut state = StoreState::new();
        let now = Utc::now();

        let report = import_legacy(&kv, &mut state, LEGACY_APPS, now);

        assert!(report.ran);
        assert_eq!(report.imported, 2);
        assert_eq!(titles(&state, "markdown"), vec!["First", "Second"]);

        let docs = state.docs_for_app("markdown");
        assert_ne!(docs[0].id, "f1");
        assert_eq!(docs[0].created_at.to_rfc3339(), "2023-01-01T00:00:00+00:00");
        assert_eq!(docs[0].updated_at.to_rfc3339(), "2023-01-02T00:00:00+00:00");
        assert_eq!(docs[1].created_at, now);
        assert_eq!(state.current_id("markdown"), Some(docs[1].id.as_str()));
    }

    #[test]
    fn test_unresolvable_current_falls_back_to_head() {
        let kv = seeded(&[
            ("svg-files", json!([{"id": 1, "name": "A", "content": "<svg/>"}])),
            ("svg-current-file", json!(99)),
        ]);
        let mut state = StoreState::new();

        import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        let head = state.docs_for_app("svg")[0].id.clone();
        assert_eq!(state.current_id("svg"), Some(head.as_str()));
    }

    #[test]
    fn test_duplicate_legacy_names_are_disambiguated() {
        let kv = seeded(&[(
            "mermaid-files",
            json!([
                {"id": "a", "name": "Flow", "content": "graph TD"},
                {"id": "b", "name": "flow", "content": "graph LR"},
                {"id": "c", "content": "sequenceDiagram"}
            ]),
        )]);
        let mut state = StoreState::new();

        import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        assert_eq!(
            titles(&state, "mermaid"),
            vec!["Flow", "flow (2)", "Mermaid Diagram"]
        );
    }

    #[test]
    fn test_flat_text_synthesized_when_not_already_present() {
        let kv = seeded(&[
            ("markdown-files", json!([{"id": "f1", "name": "Doc", "content": "kept"}])),
            ("markdown-current-file", json!("f1")),
            ("markdown-content", json!("orphan text")),
        ]);
        let mut state = StoreState::new();

        let report = import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        assert_eq!(report.imported, 1);
        assert_eq!(report.synthesized, 1);
        let docs = state.docs_for_app("markdown");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].content, json!("orphan text"));
        assert_eq!(docs[1].title, "Markdown Document");
        // The migrated pointer still wins
        assert_eq!(state.current_id("markdown"), Some(docs[0].id.as_str()));
    }

    #[test]
    fn test_flat_text_matching_a_file_is_not_duplicated() {
        let kv = seeded(&[
            ("playground-files", json!([{"id": "p", "name": "Script", "content": "console.log(1)", "language": "javascript"}])),
            ("playground-code", json!("console.log(1)")),
        ]);
        let mut state = StoreState::new();

        let report = import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        assert_eq!(report.synthesized, 0);
        let docs = state.docs_for_app("playground");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].meta, json!({"language": "javascript"}));
    }

    #[test]
    fn test_flat_only_tool_gets_single_current_doc() {
        let kv = seeded(&[("json-input", json!("{\"a\": 1}"))]);
        let mut state = StoreState::new();

        import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        let docs = state.docs_for_app("json");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "JSON Document");
        assert_eq!(state.current_id("json"), Some(docs[0].id.as_str()));
    }

    #[test]
    fn test_bare_task_array_is_wrapped() {
        let kv = seeded(&[("tasks", json!([{"text": "ship", "done": false}]))]);
        let mut state = StoreState::new();

        import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        let docs = state.docs_for_app("tasks");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Task List");
        assert_eq!(docs[0].content, json!({"tasks": [{"text": "ship", "done": false}]}));
    }

    #[test]
    fn test_malformed_shape_does_not_block_others() {
        let kv = seeded(&[
            ("markdown-files", json!({"not": "an array"})),
            ("svg-files", json!([42, {"id": "ok", "name": "Good", "content": "<svg/>"}])),
            ("tasks", json!("not a list")),
            ("mermaid-code", json!("graph TD")),
        ]);
        let mut state = StoreState::new();

        let report = import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        assert_eq!(report.skipped, 3);
        assert_eq!(titles(&state, "svg"), vec!["Good"]);
        assert_eq!(titles(&state, "mermaid"), vec!["Mermaid Diagram"]);
        assert!(state.docs_for_app("markdown").is_empty());
        assert!(state.docs_for_app("tasks").is_empty());
    }

    #[test]
    fn test_empty_flat_values_are_ignored() {
        let kv = seeded(&[("svg-content", json!("   ")), ("tasks", json!([]))]);
        let mut state = StoreState::new();

        let report = import_legacy(&kv, &mut state, LEGACY_APPS, Utc::now());

        assert_eq!(report.total(), 0);
        assert!(state.docs_by_id.is_empty());
    }

    #[test]
    fn test_content_matches_wrapped_text() {
        assert!(content_matches(&json!({"text": "hi"}), &json!("hi")));
        assert!(content_matches(&json!({"b": 1, "a": 2}), &json!({"a": 2, "b": 1})));
        assert!(!content_matches(&json!({"text": "hi", "x": 1}), &json!("hi")));
        assert!(!content_matches(&json!("hi"), &json!("ho")));
    }
}
