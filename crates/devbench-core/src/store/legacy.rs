//! Storage formats used by the tools before the unified document store.
//!
//! These keys are only ever read. Migration leaves them in place.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Shape of a pre-multi-document "current content" key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatShape {
    /// A bare string, stored as-is; the session wraps it into the tool's
    /// single-text-field shape on load.
    Text,
    /// A bare array, wrapped into `{ <key>: [...] }` on import.
    List { wrap_key: &'static str },
}

/// Where one tool kept its documents before migration.
#[derive(Debug, Clone, Copy)]
pub struct LegacyApp {
    pub app_id: &'static str,
    pub default_title: &'static str,
    /// Array of `{id, name, content, createdAt, updatedAt}` records.
    pub files_key: Option<&'static str>,
    /// Scalar id of the active file record.
    pub current_id_key: Option<&'static str>,
    pub flat_key: Option<&'static str>,
    pub flat_shape: FlatShape,
}

pub const LEGACY_APPS: &[LegacyApp] = &[
    LegacyApp {
        app_id: "markdown",
        default_title: "Markdown Document",
        files_key: Some("markdown-files"),
        current_id_key: Some("markdown-current-file"),
        flat_key: Some("markdown-content"),
        flat_shape: FlatShape::Text,
    },
    LegacyApp {
        app_id: "svg",
        default_title: "SVG Image",
        files_key: Some("svg-files"),
        current_id_key: Some("svg-current-file"),
        flat_key: Some("svg-content"),
        flat_shape: FlatShape::Text,
    },
    LegacyApp {
        app_id: "mermaid",
        default_title: "Mermaid Diagram",
        files_key: Some("mermaid-files"),
        current_id_key: Some("mermaid-current-file"),
        flat_key: Some("mermaid-code"),
        flat_shape: FlatShape::Text,
    },
    LegacyApp {
        app_id: "playground",
        default_title: "Playground Script",
        files_key: Some("playground-files"),
        current_id_key: Some("playground-current-file"),
        flat_key: Some("playground-code"),
        flat_shape: FlatShape::Text,
    },
    LegacyApp {
        app_id: "json",
        default_title: "JSON Document",
        files_key: None,
        current_id_key: None,
        flat_key: Some("json-input"),
        flat_shape: FlatShape::Text,
    },
    LegacyApp {
        app_id: "tasks",
        default_title: "Task List",
        files_key: None,
        current_id_key: None,
        flat_key: Some("tasks"),
        flat_shape: FlatShape::List { wrap_key: "tasks" },
    },
];

/// One record from a legacy files list, after lenient parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFileRecord {
    pub legacy_id: Option<String>,
    pub name: Option<String>,
    pub content: Value,
    pub language: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LegacyFileRecord {
    /// Parse one array element. Anything that isn't an object is rejected;
    /// individual fields fall back to absent when they have an unexpected type.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            legacy_id: obj.get("id").and_then(scalar_id),
            name: string_field(obj, "name").or_else(|| string_field(obj, "title")),
            content: obj.get("content").cloned().unwrap_or(Value::Null),
            language: string_field(obj, "language"),
            created_at: obj.get("createdAt").and_then(parse_timestamp),
            updated_at: obj.get("updatedAt").and_then(parse_timestamp),
        })
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Legacy ids were written both as strings and as numbers.
pub fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// ISO-8601 strings or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
