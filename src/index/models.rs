use serde::Serialize;

/// A chunk ready for indexing.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub token_count: usize,
    /// Path of the source document.
    pub source: String,
    /// Index of the chunk within its document.
    pub position: usize,
    pub embedding: Vec<f32>,
}

/// A chunk as stored in the index, without its vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredChunk {
    pub id: i64,
    pub text: String,
    pub source: String,
    pub position: usize,
    pub token_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: StoredChunk,
    /// L2 distance between query and chunk vector.
    pub distance: f64,
    /// `1 / (1 + distance)`; higher is more similar.
    pub score: f64,
}

impl SearchHit {
    #[must_use]
    pub fn new(chunk: StoredChunk, distance: f64) -> Self {
        Self {
            chunk,
            distance,
            score: similarity_from_distance(distance),
        }
    }
}

/// Map an L2 distance onto (0, 1], strictly decreasing in the distance.
#[must_use]
pub fn similarity_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance.max(0.0))
}
