//! Core data models used throughout semdex.
//!
//! These types represent the documents, import reports, and search results
//! that flow through the import and retrieval pipeline.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use uuid::Uuid;

/// One row per distinct source file path, as stored in PostgreSQL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    /// Unique relative path from the content root; primary lookup key.
    pub file_path: String,
    /// First level-1 heading of the content, recomputed on every re-import.
    pub title: Option<String>,
    /// Full raw text of the primary-language version.
    pub content: String,
    /// SHA-256 hex digest of `content`; equal hash means skip re-embedding.
    pub content_hash: String,
    pub embedding: Option<Vector>,
    /// Embedding of a translated rendering of the same content.
    pub embedding_alt: Option<Vector>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which embedding column an import targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportLanguage {
    /// The documents' own language; writes content, hash, title, `embedding`.
    Primary,
    /// Translated renderings of already-imported documents; writes
    /// `embedding_alt` only.
    Translated,
}

/// Per-file outcome of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Added,
    Updated,
    Skipped,
}

/// Aggregate result of a batch import. Per-file failures are captured as
/// `"{path}: {message}"` entries and never abort the remaining walk.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub added: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn record(&mut self, outcome: ImportOutcome) {
        match outcome {
            ImportOutcome::Added => self.added += 1,
            ImportOutcome::Updated => self.updated += 1,
            ImportOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// A ranked search result. Lower `distance` means more similar.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub file_path: String,
    pub title: Option<String>,
    /// First 200 characters of the content, `...`-suffixed if truncated.
    pub snippet: String,
    /// Cosine distance of the better-matching embedding column.
    pub distance: f64,
}
