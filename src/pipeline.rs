//! Build → serve lifecycle of the retrieval pipeline.
//!
//! [`Pipeline`] owns the configuration, the text encoder and, once READY,
//! the loaded [`VectorIndex`]. `initialize` runs ingestion (scan, extract,
//! chunk, embed, build, save, load) or loads an existing snapshot;
//! `retrieve` answers queries against the loaded index.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::chunker::{SentenceChunker, TokenCounter};
use crate::config::Config;
use crate::embedder::{Embedder, TextEncoder};
use crate::error::{IndexingError, IngestionError, RetrievalError};
use crate::extractor::Extractor;
use crate::index::{Chunk, IndexManifest, VectorIndex};
use crate::retriever::{RetrievedChunk, Retriever};
use crate::scanner::CorpusScanner;

/// Chunks embedded per call to the model.
const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Uninitialized,
    Building,
    Ready,
}

/// Extracted text of one successfully processed file.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub text: String,
}

/// Snapshot of the pipeline for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub model: String,
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_top_k: usize,
    pub index_dir: PathBuf,
    pub index_exists: bool,
    pub indexed_chunks: Option<usize>,
    pub indexed_documents: Option<usize>,
    pub built_at: Option<DateTime<Utc>>,
}

pub struct Pipeline {
    config: Config,
    encoder: TextEncoder,
    tokens: Arc<dyn TokenCounter>,
    extractor: Extractor,
    state: PipelineState,
    index: Option<VectorIndex>,
    manifest: Option<IndexManifest>,
}

impl Pipeline {
    /// `tokens` measures chunk sizes and should match the embedding model's tokenizer.
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, tokens: Arc<dyn TokenCounter>) -> Self {
        let encoder = TextEncoder::new(embedder, &config.model);
        let extractor = Extractor::from_config(&config);
        Self {
            config,
            encoder,
            tokens,
            extractor,
            state: PipelineState::Uninitialized,
            index: None,
            manifest: None,
        }
    }

    /// Replace the extractor, e.g. to use a different language detector.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The loaded index, once READY.
    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    /// Make the pipeline READY.
    ///
    /// Loads the existing index, or builds one from `corpus_root` (default:
    /// the configured corpus directory) when none exists or `force_rebuild`
    /// is set. Calling it again on a READY pipeline without `force_rebuild`
    /// does nothing. If a rebuild fails, the previously loaded index stays
    /// in service.
    pub fn initialize(
        &mut self,
        corpus_root: Option<&Path>,
        force_rebuild: bool,
    ) -> Result<(), IngestionError> {
        if self.state == PipelineState::Ready && !force_rebuild {
            info!("Pipeline already initialized");
            return Ok(());
        }

        let index_dir = self.config.index_path();
        let previous = self.state;
        self.state = PipelineState::Building;

        let result = if !force_rebuild && index_dir.is_dir() {
            info!("Loading existing index from {}", index_dir.display());
            self.load_index(&index_dir).map_err(IngestionError::from)
        } else {
            let root = corpus_root
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.config.corpus_path());
            info!("Building index from {}", root.display());
            self.build_index(&root, &index_dir)
        };

        match result {
            Ok((index, manifest)) => {
                self.index = Some(index);
                self.manifest = Some(manifest);
                self.state = PipelineState::Ready;
                info!("Pipeline ready");
                Ok(())
            }
            Err(e) => {
                self.state = previous;
                Err(e)
            }
        }
    }

    /// Top chunks for `query`; `top_k` defaults to the configured value.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let index = match (&self.index, self.state) {
            (Some(index), PipelineState::Ready) => index,
            _ => return Err(RetrievalError::NotReady),
        };
        let k = top_k.unwrap_or(self.config.default_top_k);
        Retriever::new(index, &self.encoder).retrieve(query, k)
    }

    pub fn status(&self) -> PipelineStatus {
        let index_dir = self.config.index_path();
        PipelineStatus {
            state: self.state,
            model: self.config.model.name.clone(),
            dimension: self.config.model.dimensions,
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            default_top_k: self.config.default_top_k,
            index_exists: index_dir.is_dir(),
            index_dir,
            indexed_chunks: self.manifest.as_ref().map(|m| m.chunk_count),
            indexed_documents: self.manifest.as_ref().map(|m| m.document_count),
            built_at: self.manifest.as_ref().map(|m| m.created_at),
        }
    }

    fn load_index(&self, index_dir: &Path) -> Result<(VectorIndex, IndexManifest), IndexingError> {
        VectorIndex::load(
            index_dir,
            self.config.model.dimensions,
            &self.config.model.name,
        )
    }

    fn build_index(
        &self,
        corpus_root: &Path,
        index_dir: &Path,
    ) -> Result<(VectorIndex, IndexManifest), IngestionError> {
        let scan = CorpusScanner::from_config(&self.config).scan(corpus_root)?;
        let documents = self.extract_documents(scan.iter());
        if documents.is_empty() {
            return Err(IndexingError::NoDocuments.into());
        }

        let total_tokens: usize = documents
            .iter()
            .map(|d| self.tokens.count_tokens(&d.text))
            .sum();
        info!(
            "Processed {} of {} files ({} tokens in total)",
            documents.len(),
            scan.total(),
            total_tokens
        );

        let chunks = self.embed_chunks(&documents)?;
        let index = VectorIndex::build(self.config.model.dimensions, &chunks)?;
        let manifest = IndexManifest::describe(
            &index,
            self.encoder.model_name(),
            self.config.chunk_size,
            self.config.chunk_overlap,
        )?;
        index.save(index_dir, &manifest)?;
        drop(index);

        // Serve from the persisted snapshot so queries see what a restart would see
        Ok(self.load_index(index_dir)?)
    }

    /// Extract every scanned file, skipping failures and empty results.
    fn extract_documents<'a>(
        &self,
        files: impl Iterator<Item = (&'a str, &'a Path)>,
    ) -> Vec<Document> {
        let mut documents = Vec::new();
        for (extension, path) in files {
            match self.extractor.extract(path, extension) {
                Ok(text) if text.trim().is_empty() => {
                    info!("No content retained from {}, skipping", path.display());
                }
                Ok(text) => documents.push(Document {
                    source: path.display().to_string(),
                    text,
                }),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
        documents
    }

    /// Chunk all documents and embed the chunk texts as passages.
    fn embed_chunks(&self, documents: &[Document]) -> Result<Vec<Chunk>, IndexingError> {
        let chunker = SentenceChunker::new(
            Arc::clone(&self.tokens),
            self.config.chunk_size,
            self.config.chunk_overlap,
        );

        let mut pending: Vec<(String, crate::chunker::TextChunk)> = Vec::new();
        for document in documents {
            for chunk in chunker.split(&document.text) {
                pending.push((document.source.clone(), chunk));
            }
        }
        if pending.is_empty() {
            return Err(IndexingError::NoChunks);
        }
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            pending.len()
        );

        let pb = self.progress_bar(pending.len() as u64);
        let mut chunks = Vec::with_capacity(pending.len());
        for batch in pending.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|(_, c)| c.text.as_str()).collect();
            let vectors = self.encoder.encode_passages(&texts)?;
            for ((source, chunk), embedding) in batch.iter().zip(vectors) {
                chunks.push(Chunk {
                    text: chunk.text.clone(),
                    token_count: chunk.token_count,
                    source: source.clone(),
                    position: chunk.position,
                    embedding,
                });
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        Ok(chunks)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) =
            ProgressStyle::with_template("  Embedding {bar:40.cyan/blue} {pos}/{len} chunks ({eta})")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    use docx_rs::{Docx, Paragraph, Run};

    use crate::chunker::WhitespaceTokenizer;
    use crate::embedder::mock::MockEmbedder;
    use crate::extractor::language::FixedDetector;

    fn write_docx(path: &Path, paragraphs: &[(&str, bool)]) {
        let mut docx = Docx::new();
        for (text, heading) in paragraphs {
            let mut p = Paragraph::new().add_run(Run::new().add_text(*text));
            if *heading {
                p = p.style("Heading1");
            }
            docx = docx.add_paragraph(p);
        }
        docx.build().pack(File::create(path).unwrap()).unwrap();
    }

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.corpus_dir = root.join("files").display().to_string();
        config.index_dir = root.join("Index").display().to_string();
        config.chunk_size = 20;
        config.chunk_overlap = 4;
        config.default_top_k = 3;
        config.show_progress = false;
        config.model.dimensions = 128;
        config
    }

    fn pipeline(config: Config) -> Pipeline {
        let extractor = Extractor::with_detector(&config, Box::new(FixedDetector::always("deu")));
        Pipeline::new(
            config,
            Arc::new(MockEmbedder::new(128)),
            Arc::new(WhitespaceTokenizer),
        )
        .with_extractor(extractor)
    }

    fn corpus(root: &Path) {
        let files = root.join("files");
        fs::create_dir_all(&files).unwrap();
        write_docx(
            &files.join("haus.docx"),
            &[
                ("Geschichte", true),
                ("Das Haus wurde 1755 erbaut und später erweitert.", false),
                ("Im Jahr 1902 übernahm die Stiftung das Gebäude.", false),
            ],
        );
        write_docx(
            &files.join("sammlung.docx"),
            &[
                ("Sammlung", true),
                ("Die Gemälde hängen heute im Gartensaal.", false),
            ],
        );
    }

    #[test]
    fn test_retrieve_before_initialize_is_not_ready() {
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(test_config(tmp.path()));
        assert_eq!(p.state(), PipelineState::Uninitialized);
        assert!(matches!(
            p.retrieve("Haus", None),
            Err(RetrievalError::NotReady)
        ));
    }

    #[test]
    fn test_initialize_builds_and_serves() {
        let tmp = tempfile::tempdir().unwrap();
        corpus(tmp.path());
        let mut p = pipeline(test_config(tmp.path()));

        p.initialize(None, false).unwrap();
        assert_eq!(p.state(), PipelineState::Ready);

        let results = p.retrieve("Gemälde Gartensaal", None).unwrap();
        assert!(!results.is_empty() && results.len() <= 3);
        assert!(results[0].source.ends_with("sammlung.docx"));

        let status = p.status();
        assert!(status.index_exists);
        assert_eq!(status.indexed_documents, Some(2));
        assert_eq!(status.indexed_chunks, p.index().map(|i| i.len().unwrap()));
    }

    #[test]
    fn test_initialize_is_idempotent_and_reloads_existing_index() {
        let tmp = tempfile::tempdir().unwrap();
        corpus(tmp.path());
        let config = test_config(tmp.path());

        let mut first = pipeline(config.clone());
        first.initialize(None, false).unwrap();
        let ids = first.index().unwrap().chunk_ids().unwrap();
        first.initialize(None, false).unwrap();
        assert_eq!(first.index().unwrap().chunk_ids().unwrap(), ids);

        // A fresh pipeline finds the saved snapshot even without a corpus
        fs::remove_dir_all(tmp.path().join("files")).unwrap();
        let mut second = pipeline(config);
        second.initialize(None, false).unwrap();
        assert_eq!(second.index().unwrap().chunk_ids().unwrap(), ids);
        assert_eq!(
            second.retrieve("Stiftung", Some(2)).unwrap(),
            first.retrieve("Stiftung", Some(2)).unwrap()
        );
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_index() {
        let tmp = tempfile::tempdir().unwrap();
        corpus(tmp.path());
        let mut p = pipeline(test_config(tmp.path()));
        p.initialize(None, false).unwrap();

        let empty = tmp.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let err = p.initialize(Some(&empty), true).unwrap_err();
        assert!(matches!(
            err,
            IngestionError::Indexing(IndexingError::NoDocuments)
        ));

        assert_eq!(p.state(), PipelineState::Ready);
        assert!(!p.retrieve("Haus", None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_corpus_is_scan_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = pipeline(test_config(tmp.path()));
        let err = p.initialize(None, false).unwrap_err();
        assert!(matches!(err, IngestionError::Scan(_)));
        assert_eq!(p.state(), PipelineState::Uninitialized);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        corpus(tmp.path());
        fs::write(tmp.path().join("files/kaputt.docx"), b"not a docx").unwrap();
        fs::write(tmp.path().join("files/kaputt.pdf"), b"not a pdf").unwrap();

        let mut p = pipeline(test_config(tmp.path()));
        p.initialize(None, false).unwrap();
        assert_eq!(p.status().indexed_documents, Some(2));
    }

    #[test]
    fn test_status_serializes() {
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(test_config(tmp.path()));
        let json = serde_json::to_value(p.status()).unwrap();
        assert_eq!(json["state"], "UNINITIALIZED");
        assert_eq!(json["index_exists"], false);
        assert!(json["indexed_chunks"].is_null());
    }
}
