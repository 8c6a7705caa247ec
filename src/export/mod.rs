//! Note export: Markdown, standalone HTML, plain text and raw JSON backup.

pub mod html;
pub mod markdown;
pub mod text;

pub use html::{export_note_html, to_html};
pub use markdown::{export_note_markdown, to_markdown};
pub use text::to_text;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::Node;
use crate::error::Result;

/// A note with the metadata the export formats carry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteExport {
    pub title: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content: Node,
}

/// Raw canonical JSON, the lossless backup format.
pub fn export_note_json(note: &NoteExport) -> Result<String> {
    Ok(serde_json::to_string_pretty(note)?)
}
