/// ONNX Runtime embedder using the `ort` crate.
///
/// Loads an E5-style ONNX model, runs inference, applies mean pooling with
/// the attention mask, and L2-normalizes the result.
use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use super::tokenizer::BertTokenizer;
use super::{Embedder, EmbedderError};
use crate::config::ModelConfig;

/// ONNX-backed embedder implementing the `Embedder` trait.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Arc<BertTokenizer>,
    dimensions: usize,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn new(model_dir: &Path, model: &ModelConfig) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");

        if !model_path.exists() {
            return Err(EmbedderError::ModelLoadFailed(format!(
                "model.onnx not found in {}",
                model_dir.display()
            )));
        }

        info!("Initializing ONNX Runtime for {}...", model.name);

        let threads = model.threads.max(1);
        let session = Session::builder()
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("session builder error: {e}")))?
            .with_intra_threads(threads)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .with_inter_threads(threads)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("thread config error: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model load error: {e}")))?;

        info!("ONNX model loaded from {}", model_path.display());

        let tokenizer = BertTokenizer::from_model_dir(model_dir)
            .map_err(|e| EmbedderError::TokenizerError(e.to_string()))?;

        info!("Tokenizer loaded (vocab size: {})", tokenizer.vocab_size());

        Ok(Self {
            session: Mutex::new(session),
            tokenizer: Arc::new(tokenizer),
            dimensions: model.dimensions,
        })
    }

    /// The model's tokenizer, shared with the chunker for token counting.
    pub fn tokenizer(&self) -> Arc<BertTokenizer> {
        Arc::clone(&self.tokenizer)
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let tokens = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| EmbedderError::TokenizerError(e.to_string()))?;

        let seq_len = tokens.input_ids.len();

        // (shape, data) tuples avoid an ndarray version coupling with ort
        let input_ids_val = Tensor::from_array(([1usize, seq_len], tokens.input_ids))
            .map_err(|e| EmbedderError::InferenceFailed(format!("input_ids error: {e}")))?;
        let attention_mask_val =
            Tensor::from_array(([1usize, seq_len], tokens.attention_mask.clone())).map_err(
                |e| EmbedderError::InferenceFailed(format!("attention_mask error: {e}")),
            )?;
        let token_type_ids_val = Tensor::from_array(([1usize, seq_len], vec![0i64; seq_len]))
            .map_err(|e| EmbedderError::InferenceFailed(format!("token_type_ids error: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbedderError::InferenceFailed(format!("lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_val,
                "attention_mask" => attention_mask_val,
                "token_type_ids" => token_type_ids_val,
            ])
            .map_err(|e| EmbedderError::InferenceFailed(format!("inference failed: {e}")))?;

        // Shape [1, seq_len, hidden_size]
        let (_shape, hidden_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("output extraction: {e}")))?;

        if hidden_data.len() != seq_len * self.dimensions {
            return Err(EmbedderError::InferenceFailed(format!(
                "model output has {} values, expected {} tokens x {} dimensions",
                hidden_data.len(),
                seq_len,
                self.dimensions
            )));
        }

        let embedding = mean_pooling(hidden_data, &tokens.attention_mask, seq_len, self.dimensions);
        Ok(l2_normalize(&embedding))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Mean pooling over hidden states weighted by attention mask.
///
/// `hidden_data` is a flat array with shape `[1, seq_len, hidden_size]`.
fn mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum: f32 = 0.0;

    for (t, &mask) in attention_mask.iter().enumerate().take(seq_len) {
        let mask = mask as f32;
        mask_sum += mask;

        let row = &hidden_data[t * hidden_size..(t + 1) * hidden_size];
        for (acc, &h) in result.iter_mut().zip(row) {
            *acc += h * mask;
        }
    }

    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }

    result
}

/// L2-normalize a vector, returning the normalized copy.
fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return vec.to_vec();
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    vec.iter().map(|v| v * inv_norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let normed = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = normed.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normed[0] - 0.6).abs() < 1e-6);
        assert!((normed[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mean_pooling_averages_real_tokens() {
        // 3 tokens, hidden_size=2, last token is padding
        let hidden = vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let result = mean_pooling(&hidden, &[1, 1, 0], 3, 2);
        assert_eq!(result, vec![2.0, 3.0]);
    }

    #[test]
    fn test_mean_pooling_all_masked() {
        let result = mean_pooling(&[5.0, 5.0], &[0], 1, 2);
        assert_eq!(result, vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxEmbedder::new(dir.path(), &ModelConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, EmbedderError::ModelLoadFailed(_)));
    }

    /// Requires downloaded model files and the ONNX Runtime library.
    #[test]
    #[ignore]
    fn test_onnx_embed() {
        let model = ModelConfig::default();
        let model_dir = Path::new(&model.dir);
        if !model_dir.join("model.onnx").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let embedder = OnnxEmbedder::new(model_dir, &model).unwrap();
        let vec = embedder.embed("query: Wann wurde das Museum gegründet?").unwrap();

        assert_eq!(vec.len(), model.dimensions);
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "expected unit vector, got norm={norm}");
    }
}
