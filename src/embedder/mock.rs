/// Deterministic embedder for tests.
///
/// Hashes every lowercase word into one of `dimensions` buckets and
/// L2-normalizes the counts, so texts that share words end up close to each
/// other without loading a model.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError};

/// Hashed bag-of-words embedder.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn bucket(&self, word: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        (hasher.finish() % self.dimensions as u64) as usize
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 384 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if self.dimensions == 0 {
            return Err(EmbedderError::InferenceFailed(
                "mock embedder has zero dimensions".to_string(),
            ));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            embedding[self.bucket(&word.to_lowercase())] += 1.0;
        }

        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
    }

    #[test]
    fn test_mock_embed_dimensions() {
        let result = MockEmbedder::new(64).embed("hallo welt").unwrap();
        assert_eq!(result.len(), 64);
    }

    #[test]
    fn test_mock_embed_deterministic() {
        let embedder = MockEmbedder::default();
        assert_eq!(embedder.embed("Brief").unwrap(), embedder.embed("Brief").unwrap());
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = MockEmbedder::default();
        let query = embedder.embed("query: Gemälde im Gartensaal").unwrap();
        let close = embedder.embed("Die Gemälde hängen im Gartensaal.").unwrap();
        let far = embedder.embed("Briefwechsel mit dem Verleger aus Leipzig.").unwrap();
        assert!(distance(&query, &close) < distance(&query, &far));
    }

    #[test]
    fn test_mock_embed_normalized() {
        let vec = MockEmbedder::default().embed("test normalization").unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "got norm {norm}");
    }

    #[test]
    fn test_text_without_words_is_zero_vector() {
        let vec = MockEmbedder::new(8).embed(" ... ").unwrap();
        assert_eq!(vec, vec![0.0; 8]);
    }

    #[test]
    fn test_mock_embed_batch() {
        let results = MockEmbedder::new(128).embed_batch(&["a", "b", "c"]).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|v| v.len() == 128));
    }
}
