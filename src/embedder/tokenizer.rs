/// BERT-style tokenizer wrapper around the HuggingFace `tokenizers` crate.
///
/// Produces model inputs for the ONNX embedder and doubles as the chunker's
/// [`TokenCounter`], so chunk sizes are measured in the embedding model's
/// own tokens.
use std::path::Path;

use anyhow::Result;
use tokenizers::Tokenizer;
use tracing::debug;

use crate::chunker::TokenCounter;

/// Longest input the model accepts (XLM-RoBERTa default).
const MAX_LENGTH: usize = 512;

/// Wrapper around the HuggingFace tokenizer for BERT-style models.
pub struct BertTokenizer {
    /// Truncating, padding tokenizer used for model input.
    inner: Tokenizer,
    /// Same vocabulary without truncation, used for counting.
    counter: Tokenizer,
}

/// Output of a tokenization operation.
#[derive(Debug, Clone)]
pub struct TokenizerOutput {
    /// Token IDs (input_ids for the model).
    pub input_ids: Vec<i64>,
    /// Attention mask (1 for real tokens, 0 for padding).
    pub attention_mask: Vec<i64>,
}

impl BertTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file in the model directory.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {}",
            model_dir.display()
        );

        let mut counter = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        counter
            .with_truncation(None)
            .map_err(|e| anyhow::anyhow!("failed to disable truncation: {e}"))?;
        counter.with_padding(None);

        let mut inner = counter.clone();
        inner
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to configure truncation: {e}"))?;
        inner.with_padding(Some(tokenizers::PaddingParams::default()));

        Ok(Self { inner, counter })
    }

    /// Tokenize a single text, returning input IDs and attention mask.
    pub fn tokenize(&self, text: &str) -> Result<TokenizerOutput> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("failed to encode text: {e}"))?;

        Ok(TokenizerOutput {
            input_ids: encoding.get_ids().iter().map(|&id| id as i64).collect(),
            attention_mask: encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect(),
        })
    }

    /// Number of tokens in `text`, without special tokens and untruncated.
    pub fn count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .counter
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("failed to encode text: {e}"))?;
        Ok(encoding.len())
    }

    /// Get the vocabulary size.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(false)
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        MAX_LENGTH
    }
}

impl TokenCounter for BertTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        match self.count(text) {
            Ok(n) => n,
            Err(e) => {
                // Encoding plain text practically never fails; words are a
                // lower bound on subword tokens.
                debug!("token count fell back to words: {e}");
                text.split_whitespace().count()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_DIR: &str = "models/multilingual-e5-small";

    /// Requires the downloaded tokenizer.json.
    #[test]
    #[ignore]
    fn test_tokenize_with_real_model() {
        let model_dir = Path::new(MODEL_DIR);
        if !model_dir.join("tokenizer.json").exists() {
            eprintln!("Skipping: model files not downloaded");
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir).unwrap();
        let output = tokenizer.tokenize("Das Museum wurde 1902 gegründet.").unwrap();

        assert!(!output.input_ids.is_empty());
        assert_eq!(output.input_ids.len(), output.attention_mask.len());
        // CLS and SEP
        assert!(output.input_ids.len() >= 3);
    }

    #[test]
    #[ignore]
    fn test_count_excludes_special_tokens_and_is_untruncated() {
        let model_dir = Path::new(MODEL_DIR);
        if !model_dir.join("tokenizer.json").exists() {
            return;
        }

        let tokenizer = BertTokenizer::from_model_dir(model_dir).unwrap();
        let text = "Brief ".repeat(1000);
        let with_special = tokenizer.tokenize("Brief").unwrap().input_ids.len();
        assert_eq!(tokenizer.count_tokens("Brief") + 2, with_special);
        assert!(tokenizer.count_tokens(&text) > MAX_LENGTH);
    }

    #[test]
    fn test_tokenizer_missing_file() {
        let result = BertTokenizer::from_model_dir(Path::new("/nonexistent/path"));
        assert!(result.is_err());
    }
}
