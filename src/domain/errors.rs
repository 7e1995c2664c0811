use std::path::PathBuf;
use thiserror::Error;

/// Failure of one file inside a batch ingestion.
///
/// These never abort the batch: the pipeline records them in the
/// per-file outcome and moves on to the next file.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("topic classification failed: {0}")]
    Classification(String),

    #[error("archiving to {target:?} failed: {source}")]
    Archive {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store write failed: {0}")]
    Store(String),
}

/// Errors raised by the library services and their collaborators.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A query or point vector does not fit the collection it targets.
    #[error("vector dimension ({actual}) does not match collection '{collection}' dimension ({expected})")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// An existing collection was created with a different distance metric.
    #[error("collection '{collection}' uses {actual} distance but {expected} is configured")]
    MetricMismatch {
        collection: String,
        expected: String,
        actual: String,
    },

    #[error("embedding model '{0}' is not supported")]
    UnsupportedModel(String),

    #[error("path is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("embedding backend error: {0}")]
    Embedding(String),
}
