use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::errors::PipelineError;

/// A short topic label and the free-text description used to match papers against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDefinition {
    pub label: String,
    pub description: String,
}

/// Result of classifying a snippet against a set of topics.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMatch {
    pub label: String,
    pub similarity: f32,
}

/// Whether ingestion relocates the source PDF or leaves it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveMode {
    #[default]
    Move,
    Copy,
}

/// Payload stored alongside every paper vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPayload {
    pub path: String,
    pub topic: String,
    pub topic_sim: f32,
    pub document: String,
}

/// Payload stored alongside every image vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperHit {
    pub id: String,
    pub path: String,
    pub topic: String,
    pub topic_sim: f32,
    /// Smaller is more similar.
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageHit {
    pub id: String,
    pub path: String,
    pub distance: f32,
}

/// What a search produced. An empty collection is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome<T> {
    EmptyLibrary,
    Hits(Vec<T>),
}

impl<T> SearchOutcome<T> {
    pub fn is_empty_library(&self) -> bool {
        matches!(self, SearchOutcome::EmptyLibrary)
    }

    /// Hits, or an empty list when the library is empty.
    pub fn into_hits(self) -> Vec<T> {
        match self {
            SearchOutcome::EmptyLibrary => Vec::new(),
            SearchOutcome::Hits(hits) => hits,
        }
    }
}

#[derive(Debug)]
pub enum ItemStatus {
    Indexed {
        id: String,
        archived_path: PathBuf,
        topic: String,
        similarity: f32,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: PipelineError,
    },
}

/// Outcome of pushing one source file through the paper pipeline.
#[derive(Debug)]
pub struct IngestOutcome {
    pub source: PathBuf,
    pub status: ItemStatus,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub outcomes: Vec<IngestOutcome>,
    /// Records held by the paper collection once the batch finished.
    pub total_records: u64,
}

impl IngestReport {
    pub fn indexed(&self) -> impl Iterator<Item = &IngestOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Indexed { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &IngestOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &IngestOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Failed { .. }))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImageIndexReport {
    pub discovered: usize,
    pub indexed: usize,
    pub dimension: Option<usize>,
    pub total_records: u64,
}
