//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! - [`FileProcessingError`]: per-file scan/parse failures, recoverable by skipping the file
//! - [`IndexingError`]: build/persist/load failures, fatal to the pipeline run
//! - [`RetrievalError`]: query-time failures, fatal to that single query only
use std::path::PathBuf;

use thiserror::Error;

use crate::embedder::EmbedderError;

/// Failure while scanning the corpus or extracting a single file.
#[derive(Error, Debug)]
pub enum FileProcessingError {
    #[error("directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("unsupported file type '{extension}': {}", path.display())]
    Unsupported { path: PathBuf, extension: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to process PDF {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },

    #[error("failed to process DOCX {}: {message}", path.display())]
    Docx { path: PathBuf, message: String },
}

/// Failure while building, persisting, or loading the vector index.
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("no documents were successfully processed")]
    NoDocuments,

    #[error("documents produced no chunks")]
    NoChunks,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector store error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("index directory does not exist: {}", .0.display())]
    MissingIndex(PathBuf),

    #[error("index at {} is incomplete: {reason}", path.display())]
    Incomplete { path: PathBuf, reason: String },

    #[error("index is inconsistent: {chunks} chunks vs {vectors} vectors ({orphans} orphaned entries)")]
    Inconsistent {
        chunks: usize,
        vectors: usize,
        orphans: usize,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while answering a single query.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("pipeline is not ready; call initialize() first")]
    NotReady,

    #[error("query is empty")]
    EmptyQuery,

    #[error("top_k must be positive")]
    InvalidTopK,

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("query vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index query failed: {0}")]
    Search(#[from] rusqlite::Error),
}

/// Failure of [`crate::pipeline::Pipeline::initialize`].
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error(transparent)]
    Scan(#[from] FileProcessingError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),
}
