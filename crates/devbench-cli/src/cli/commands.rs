use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use devbench_core::{Document, DocumentStore};
use serde::Serialize;
use serde_json::{json, Value};

/// CLI command parsed from arguments
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Apps the store has an index entry for, including ones whose
    /// documents have all been deleted
    ListApps,
    ListDocs { app_id: String },
    ShowDoc { id: String },
    Recent { limit: usize },
    Stats,
    Migrate,
    Rename { id: String, title: String },
    Delete { id: String },
}

/// Listing row; content is left out so large documents don't flood the terminal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocSummary<'a> {
    id: &'a str,
    app_id: &'a str,
    title: &'a str,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    current: bool,
}

impl<'a> DocSummary<'a> {
    fn new(doc: &'a Document, current_id: Option<&str>) -> Self {
        Self {
            id: &doc.id,
            app_id: &doc.app_id,
            title: &doc.title,
            updated_at: doc.updated_at,
            current: current_id == Some(doc.id.as_str()),
        }
    }
}

/// Run one command against the store and return its JSON result.
pub fn execute(store: &DocumentStore, command: &CliCommand) -> Result<Value> {
    let result = match command {
        CliCommand::ListApps => {
            let stats = store.get_stats();
            let apps: Vec<Value> = store
                .list_apps()
                .into_iter()
                .map(|app_id| {
                    json!({
                        "docs": stats.per_app.get(&app_id).copied().unwrap_or(0),
                        "currentId": store.get_current_id(&app_id),
                        "appId": app_id,
                    })
                })
                .collect();
            json!(apps)
        }
        CliCommand::ListDocs { app_id } => {
            let docs = store.list_docs(app_id);
            let current_id = store.get_current_id(app_id);
            let rows: Vec<DocSummary> = docs
                .iter()
                .map(|doc| DocSummary::new(doc, current_id.as_deref()))
                .collect();
            serde_json::to_value(rows)?
        }
        CliCommand::ShowDoc { id } => {
            let doc = store
                .get_doc(id)
                .ok_or_else(|| anyhow!("Document not found: {}", id))?;
            serde_json::to_value(doc)?
        }
        CliCommand::Recent { limit } => {
            let docs = store.list_all_recent_docs(*limit);
            let rows: Vec<DocSummary> = docs.iter().map(|doc| DocSummary::new(doc, None)).collect();
            serde_json::to_value(rows)?
        }
        CliCommand::Stats => serde_json::to_value(store.get_stats())?,
        CliCommand::Migrate => {
            let report = store.migrate_once().context("Migration failed")?;
            serde_json::to_value(report)?
        }
        CliCommand::Rename { id, title } => {
            let doc = store
                .rename_doc(id, title)
                .context("Failed to rename document")?
                .ok_or_else(|| anyhow!("Document not found: {}", id))?;
            serde_json::to_value(doc)?
        }
        CliCommand::Delete { id } => {
            let doc = store
                .delete_doc(id)
                .context("Failed to delete document")?
                .ok_or_else(|| anyhow!("Document not found: {}", id))?;
            json!({
                "deleted": doc.id,
                "appId": doc.app_id,
                "currentId": store.get_current_id(&doc.app_id),
            })
        }
    };
    Ok(result)
}

pub fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}
