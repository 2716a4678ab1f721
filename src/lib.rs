//! # archive-rag: retrieval over a private document archive
//!
//! Turns a corpus of PDF and DOCX files into a persisted vector index and
//! serves the top-k most relevant passages for a query.
//!
//! ## Architecture
//!
//! - **[`config`]**: configuration loading, normalization and validation
//! - **[`error`]**: error taxonomy (file processing, indexing, retrieval)
//! - **[`scanner`]**: recursive corpus enumeration by extension
//! - **[`extractor`]**: PDF/DOCX parsing, language filtering, section assembly
//! - **[`chunker`]**: sentence-aligned token windows with overlap
//! - **[`embedder`]**: text embedding via ONNX Runtime (multilingual-e5-small)
//! - **[`index`]**: SQLite + sqlite-vec index with atomic snapshots
//! - **[`retriever`]**: query embedding and ranked nearest-neighbour lookup
//! - **[`pipeline`]**: build → serve lifecycle (`initialize`, `retrieve`, `status`)

pub mod chunker;
pub mod config;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod index;
pub mod pipeline;
pub mod retriever;
pub mod scanner;
