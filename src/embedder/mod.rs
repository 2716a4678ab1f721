/// Embedder trait, shared errors, and the prefix-aware [`TextEncoder`].
///
/// The E5 family is trained asymmetrically: queries and passages carry
/// different text prefixes. Everything that embeds text for the index or for
/// a query goes through `TextEncoder` so both sides use the configured
/// convention.
pub mod download;
pub mod mock;
pub mod onnx;
pub mod tokenizer;

use std::sync::Arc;

use thiserror::Error;

use crate::config::ModelConfig;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// An embedder plus the query/passage prefix convention of its model.
#[derive(Clone)]
pub struct TextEncoder {
    embedder: Arc<dyn Embedder>,
    model_name: String,
    query_prefix: String,
    passage_prefix: String,
}

impl TextEncoder {
    pub fn new(embedder: Arc<dyn Embedder>, model: &ModelConfig) -> Self {
        Self {
            embedder,
            model_name: model.name.clone(),
            query_prefix: model.query_prefix.clone(),
            passage_prefix: model.passage_prefix.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Embed a search query with the query prefix.
    pub fn encode_query(&self, query: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embedder.embed(&format!("{}{}", self.query_prefix, query))
    }

    /// Embed passages (chunk texts) with the passage prefix.
    pub fn encode_passages(&self, passages: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if self.passage_prefix.is_empty() {
            return self.embedder.embed_batch(passages);
        }
        let prefixed: Vec<String> = passages
            .iter()
            .map(|p| format!("{}{}", self.passage_prefix, p))
            .collect();
        let refs: Vec<&str> = prefixed.iter().map(String::as_str).collect();
        self.embedder.embed_batch(&refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every text it is asked to embed.
    #[derive(Default)]
    struct RecordingEmbedder {
        seen: Mutex<Vec<String>>,
    }

    impl Embedder for RecordingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(vec![1.0, 0.0])
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_query_and_passage_prefixes_differ() {
        let recorder = Arc::new(RecordingEmbedder::default());
        let model = ModelConfig {
            query_prefix: "query: ".to_string(),
            passage_prefix: String::new(),
            ..ModelConfig::default()
        };
        let encoder = TextEncoder::new(recorder.clone(), &model);

        encoder.encode_query("Wann wurde das Haus gebaut?").unwrap();
        encoder.encode_passages(&["Das Haus wurde 1755 erbaut."]).unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0], "query: Wann wurde das Haus gebaut?");
        assert_eq!(seen[1], "Das Haus wurde 1755 erbaut.");
    }

    #[test]
    fn test_passage_prefix_applied_when_configured() {
        let recorder = Arc::new(RecordingEmbedder::default());
        let model = ModelConfig {
            passage_prefix: "passage: ".to_string(),
            ..ModelConfig::default()
        };
        let encoder = TextEncoder::new(recorder.clone(), &model);

        let vectors = encoder.encode_passages(&["a", "b"]).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["passage: a".to_string(), "passage: b".to_string()]
        );
        assert_eq!(encoder.dimensions(), 2);
    }
}
