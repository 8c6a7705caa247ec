//! Batch import orchestrator.
//!
//! Parses a set of files, resolves title collisions against the caller's
//! existing notes according to a duplicate policy, and dispatches the
//! resulting work to an async note store in three strictly ordered phases:
//! skip accounting, updates, creates. Per-note failures are recorded and the
//! batch continues; the whole operation fails only when not a single note
//! could be parsed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::document::builder::build_document;
use crate::document::Node;
use crate::error::{ImportError, Result};
use crate::import::parse_file;

/// Suffix appended to a colliding title under the rename policy.
pub const RENAME_SUFFIX: &str = " (cópia)";

/// Concurrency window for updates; no bulk-update endpoint exists.
const UPDATE_CONCURRENCY: usize = 4;

/// Bulk-create batch size. The store parallelizes within a batch, so one
/// batch is in flight at a time.
const CREATE_BATCH_SIZE: usize = 10;

/// What to do with a note whose title already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    Replace,
    Rename,
    Ignore,
}

/// One file handed to the orchestrator: a name for format detection and
/// error labels, plus its text contents.
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub name: String,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub duplicate_policy: DuplicatePolicy,
    /// When set, a notebook of this name is created and every imported note
    /// lands in it.
    pub notebook_name: Option<String>,
}

/// A note ready to persist: canonical tree content plus metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub title: String,
    pub content: Node,
    pub notebook_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A persisted note as the store reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookRecord {
    pub id: String,
    pub name: String,
}

/// The persistence collaborator. Every call either resolves to a record or
/// rejects; the orchestrator never retries.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create_note(&self, draft: &NoteDraft) -> Result<NoteRecord>;
    /// Bulk create. A failure here fails the whole call, not single notes;
    /// the orchestrator falls back to sequential creates.
    async fn create_notes(&self, drafts: &[NoteDraft]) -> Result<Vec<NoteRecord>>;
    async fn update_note(&self, id: &str, draft: &NoteDraft) -> Result<NoteRecord>;
    async fn create_notebook(&self, name: &str) -> Result<NotebookRecord>;
}

/// Outcome of one batch import.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

pub struct Importer<'a, S: NoteStore + ?Sized> {
    store: &'a S,
    existing: Vec<NoteRecord>,
}

enum Planned {
    Skip(String),
    Update(String, NoteDraft),
    Create(NoteDraft),
}

impl<'a, S: NoteStore + ?Sized> Importer<'a, S> {
    /// `existing` is the full currently loaded note set; collisions are
    /// resolved against it, not per notebook.
    pub fn new(store: &'a S, existing: Vec<NoteRecord>) -> Self {
        Importer { store, existing }
    }

    pub async fn import_files<F>(
        &self,
        files: &[ImportFile],
        options: &ImportOptions,
        mut progress: F,
    ) -> Result<ImportReport>
    where
        F: FnMut(usize, usize),
    {
        let mut report = ImportReport::default();

        // Parse phase: per-file errors are recorded, the batch continues.
        let mut notes = Vec::new();
        for file in files {
            match parse_file(&file.name, &file.contents) {
                Ok(parsed) => notes.extend(parsed),
                Err(e) => {
                    log::warn!("failed to parse {}: {}", file.name, e);
                    report.errors.push(format!("{}: {}", file.name, e));
                }
            }
        }
        if notes.is_empty() && !files.is_empty() {
            return Err(ImportError::MalformedInput(format!(
                "no notes could be parsed from {} file(s): {}",
                files.len(),
                report.errors.join("; ")
            )));
        }

        let notebook_id = match &options.notebook_name {
            Some(name) => Some(self.store.create_notebook(name).await?.id),
            None => None,
        };

        let planned: Vec<Planned> = notes
            .into_iter()
            .map(|note| self.plan(note, options.duplicate_policy, notebook_id.clone()))
            .collect();

        report.total = planned.len();
        let total = report.total;
        let mut completed = 0usize;

        let mut updates: Vec<(String, NoteDraft)> = Vec::new();
        let mut creates: Vec<NoteDraft> = Vec::new();

        // Phase 1: skip accounting.
        for item in planned {
            match item {
                Planned::Skip(title) => {
                    log::info!("skipping duplicate note: {}", title);
                    report.skipped += 1;
                    completed += 1;
                    progress(completed, total);
                }
                Planned::Update(id, draft) => updates.push((id, draft)),
                Planned::Create(draft) => creates.push(draft),
            }
        }

        // Phase 2: updates, in a fixed concurrency window.
        for group in updates.chunks(UPDATE_CONCURRENCY) {
            let results = join_all(
                group
                    .iter()
                    .map(|(id, draft)| self.store.update_note(id, draft)),
            )
            .await;
            for ((_, draft), result) in group.iter().zip(results) {
                match result {
                    Ok(_) => report.updated += 1,
                    Err(e) => report.errors.push(format!("{}: {}", draft.title, e)),
                }
                completed += 1;
                progress(completed, total);
            }
        }

        // Phase 3: creates, one bulk batch in flight at a time. A failed
        // bulk call retries that batch sequentially so one bad note cannot
        // blank the other nine.
        for batch in creates.chunks(CREATE_BATCH_SIZE) {
            match self.store.create_notes(batch).await {
                Ok(records) => {
                    report.created += records.len();
                    completed += batch.len();
                    progress(completed, total);
                }
                Err(e) => {
                    log::warn!("bulk create failed ({}), retrying sequentially", e);
                    for draft in batch {
                        match self.store.create_note(draft).await {
                            Ok(_) => report.created += 1,
                            Err(e) => report.errors.push(format!("{}: {}", draft.title, e)),
                        }
                        completed += 1;
                        progress(completed, total);
                    }
                }
            }
        }

        Ok(report)
    }

    fn plan(
        &self,
        note: crate::import::ImportedNote,
        policy: DuplicatePolicy,
        notebook_id: Option<String>,
    ) -> Planned {
        let collision = self
            .existing
            .iter()
            .find(|record| record.title.to_lowercase() == note.title.to_lowercase());

        let mut title = note.title.clone();
        let draft = |title: String| NoteDraft {
            title,
            content: build_document(&note.content),
            notebook_id,
            tags: note.tags.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        };

        match (policy, collision) {
            (DuplicatePolicy::Ignore, Some(_)) => Planned::Skip(title),
            (DuplicatePolicy::Replace, Some(record)) => {
                Planned::Update(record.id.clone(), draft(title))
            }
            (DuplicatePolicy::Rename, Some(_)) => {
                title.push_str(RENAME_SUFFIX);
                Planned::Create(draft(title))
            }
            (_, None) => Planned::Create(draft(title)),
        }
    }
}
