//! Note-format conversion engine.
//!
//! Ingests note exports in three formats — Evernote `.enex`, arbitrary
//! HTML, and Markdown with GFM extensions — into one canonical rich-text
//! document tree, and serializes that tree back out to Markdown, HTML,
//! plain text and raw JSON. A batch orchestrator drives whole-file-set
//! imports against an async note store.
//!
//! ```no_run
//! use notemill::import::parse_file;
//! use notemill::document::builder::build_document;
//!
//! # fn main() -> notemill::Result<()> {
//! let notes = parse_file("journal.md", "# Hello\n\nworld")?;
//! let tree = build_document(&notes[0].content);
//! println!("{}", notemill::export::to_markdown(&tree));
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod evernote;
pub mod export;
pub mod html;
pub mod import;
pub mod markdown;

pub use document::{Mark, MarkType, Node, NodeType};
pub use error::{ImportError, Result};
pub use export::{export_note_html, export_note_json, export_note_markdown, NoteExport};
pub use import::orchestrator::{
    DuplicatePolicy, ImportFile, ImportOptions, ImportReport, Importer, NoteStore,
};
pub use import::{parse_file, parse_path, ImportFormat, ImportedNote, ImportedResource};
