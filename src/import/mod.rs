//! File-level import: format detection and the records shared by the
//! per-format parsers and the batch orchestrator.

pub mod orchestrator;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};

/// Supported note-export formats, classified by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Enex,
    Html,
    Markdown,
}

impl ImportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "enex" => Ok(ImportFormat::Enex),
            "html" | "htm" => Ok(ImportFormat::Html),
            "md" | "markdown" => Ok(ImportFormat::Markdown),
            _ => Err(ImportError::UnsupportedFormat(
                path.to_string_lossy().to_string(),
            )),
        }
    }
}

/// An embedded binary resource pulled out of an ENEX note.
///
/// The hash is content-derived, not cryptographic; it only has to line up
/// with the `hash` attribute of the note's `en-media` references. Scoped to
/// a single note and consumed once by the content normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedResource {
    pub hash: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub mime: String,
    pub filename: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImportedResource {
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// One note produced by a parser, consumed once by the orchestrator.
/// `content` is an HTML string, pre-tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedNote {
    pub title: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub resources: Vec<ImportedResource>,
}

/// Parse one file into notes, dispatching on the detected format.
pub fn parse_file(name: &str, contents: &str) -> Result<Vec<ImportedNote>> {
    let path = Path::new(name);
    let fallback_title = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());

    match ImportFormat::from_path(path)? {
        ImportFormat::Enex => crate::evernote::import_enex(contents),
        ImportFormat::Html => Ok(vec![crate::html::import_html(contents, &fallback_title)]),
        ImportFormat::Markdown => Ok(vec![crate::markdown::import_markdown(
            contents,
            &fallback_title,
        )]),
    }
}

/// Read and parse one file from disk.
pub fn parse_path(path: &Path) -> Result<Vec<ImportedNote>> {
    let name = path.to_string_lossy().to_string();
    let contents = std::fs::read_to_string(path)?;
    parse_file(&name, &contents)
}
