//! HTML handling: a minimal DOM for tree building plus generic `.html`
//! file ingestion.

pub mod dom;
mod import;

pub use import::{extract_title, import_html};
