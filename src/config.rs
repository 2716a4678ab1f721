/// Configuration module for archive-rag.
///
/// Handles loading, validating, and providing default configuration values
/// for every stage of the pipeline (scanner, extractor, chunker, embedder,
/// index, retriever).
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::extractor::Category;
use crate::extractor::language::normalize_language_code;

// ── Default value functions ──────────────────────────────────────────

fn default_corpus_dir() -> String {
    "./data/files".to_string()
}

fn default_index_dir() -> String {
    "./data/Index".to_string()
}

fn default_chunk_size() -> usize {
    300
}

fn default_chunk_overlap() -> usize {
    30
}

fn default_top_k() -> usize {
    10
}

fn default_supported_extensions() -> Vec<String> {
    vec![".pdf".to_string(), ".docx".to_string()]
}

fn default_excluded_docx_markers() -> Vec<String> {
    vec!["englisch".to_string()]
}

fn default_language() -> String {
    "de".to_string()
}

fn default_pdf_categories() -> Vec<Category> {
    vec![Category::Title, Category::NarrativeText]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_model_name() -> String {
    "intfloat/multilingual-e5-small".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_model_dir() -> String {
    "models/multilingual-e5-small".to_string()
}

fn default_query_prefix() -> String {
    "query: ".to_string()
}

fn default_threads() -> usize {
    4
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: String,

    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    /// Maximum tokens per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Tokens shared between consecutive chunks of one document.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,

    /// `.docx` files whose name contains one of these markers are skipped.
    #[serde(default = "default_excluded_docx_markers")]
    pub excluded_docx_markers: Vec<String>,

    /// Target language of retained text (ISO 639-1 or 639-3).
    #[serde(default = "default_language")]
    pub language: String,

    /// Element categories kept from PDFs before language filtering.
    #[serde(default = "default_pdf_categories")]
    pub pdf_categories: Vec<Category>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub show_progress: bool,

    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// HuggingFace repository of the sentence-embedding model.
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Local directory holding `model.onnx` and `tokenizer.json`.
    #[serde(default = "default_model_dir")]
    pub dir: String,

    /// Prepended to queries before embedding.
    #[serde(default = "default_query_prefix")]
    pub query_prefix: String,

    /// Prepended to chunk text before embedding.
    #[serde(default)]
    pub passage_prefix: String,

    #[serde(default = "default_true")]
    pub auto_download: bool,

    #[serde(default = "default_threads")]
    pub threads: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_dir: default_corpus_dir(),
            index_dir: default_index_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            default_top_k: default_top_k(),
            supported_extensions: default_supported_extensions(),
            excluded_docx_markers: default_excluded_docx_markers(),
            language: default_language(),
            pdf_categories: default_pdf_categories(),
            log_level: default_log_level(),
            show_progress: default_true(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dimensions: default_dimensions(),
            dir: default_model_dir(),
            query_prefix: default_query_prefix(),
            passage_prefix: String::new(),
            auto_download: default_true(),
            threads: default_threads(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the binary's cwd.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let mut cfg: Config =
            serde_json::from_str(&data).with_context(|| format!("invalid JSON in {path}"))?;
        cfg.normalize();

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Lowercase extensions with a leading dot and lowercase exclusion markers.
    pub fn normalize(&mut self) {
        self.supported_extensions = self
            .supported_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect();
        self.excluded_docx_markers = self
            .excluded_docx_markers
            .iter()
            .map(|m| m.to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            self.chunk_overlap,
            self.chunk_size
        );
        anyhow::ensure!(self.default_top_k > 0, "default_top_k must be positive");
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(
            !self.supported_extensions.is_empty(),
            "at least one supported extension must be specified"
        );
        anyhow::ensure!(
            normalize_language_code(&self.language).is_some(),
            "unknown target language: {}",
            self.language
        );
        Ok(())
    }

    #[must_use]
    pub fn corpus_path(&self) -> PathBuf {
        PathBuf::from(&self.corpus_dir)
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.index_dir)
    }

    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.model.dir)
    }
}

/// `"PDF"`, `"pdf"` and `".pdf"` all become `".pdf"`.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

// ── Tests ────────────────────────────────────────────────────────────
