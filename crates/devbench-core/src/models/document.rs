use crate::constants::DOC_ID_PREFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Generate a unique document ID using UUID v4
pub fn generate_doc_id() -> String {
    format!("{}-{}", DOC_ID_PREFIX, Uuid::new_v4())
}

/// One persisted unit of tool content.
///
/// `content` and `meta` are opaque to the store; each tool owns their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub app_id: String,
    pub title: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub meta: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Approximate serialized size, used by stats.
    pub fn approx_bytes(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

/// Input for creating a document.
#[derive(Debug, Clone, Default)]
pub struct NewDoc {
    pub title: String,
    pub content: Value,
    pub meta: Value,
}

impl NewDoc {
    pub fn new(title: impl Into<String>, content: Value) -> Self {
        Self {
            title: title.into(),
            content,
            meta: Value::Null,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Shallow patch applied by `DocumentStore::update_doc`; `None` fields are kept.
#[derive(Debug, Clone, Default)]
pub struct DocUpdate {
    pub title: Option<String>,
    pub content: Option<Value>,
    pub meta: Option<Value>,
    /// Explicit stamp; defaults to now.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocUpdate {
    pub fn content(content: Value) -> Self {
        Self {
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn meta(meta: Value) -> Self {
        Self {
            meta: Some(meta),
            ..Default::default()
        }
    }

    pub fn at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}
