//! Query-time retrieval: embed the query, search the index, rank the chunks.
use serde::Serialize;
use tracing::{debug, info};

use crate::embedder::TextEncoder;
use crate::error::RetrievalError;
use crate::index::{SearchHit, VectorIndex};

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: i64,
    pub text: String,
    /// Path of the document the chunk came from.
    pub source: String,
    pub position: usize,
    pub distance: f64,
    /// Similarity in (0, 1]; results are ordered by non-increasing score.
    pub score: f64,
}

impl From<SearchHit> for RetrievedChunk {
    fn from(hit: SearchHit) -> Self {
        Self {
            chunk_id: hit.chunk.id,
            text: hit.chunk.text,
            source: hit.chunk.source,
            position: hit.chunk.position,
            distance: hit.distance,
            score: hit.score,
        }
    }
}

/// Borrows a loaded index and the encoder it was built with.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
    encoder: &'a TextEncoder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex, encoder: &'a TextEncoder) -> Self {
        Self { index, encoder }
    }

    /// Top `k` chunks for `query`, most similar first.
    ///
    /// Returns `min(k, index size)` results or an error, never a partial list.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }

        info!("Retrieving top {} chunks for query: {}", k, query);

        let vector = self.encoder.encode_query(query)?;
        if vector.len() != self.index.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: vector.len(),
            });
        }

        let results: Vec<RetrievedChunk> = self
            .index
            .search(&vector, k)?
            .into_iter()
            .map(RetrievedChunk::from)
            .collect();

        debug!(
            "Retrieved {} chunks (best score {:.4})",
            results.len(),
            results.first().map_or(0.0, |r| r.score)
        );
        Ok(results)
    }
}
