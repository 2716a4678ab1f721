//! Corpus scanner: recursive discovery of supported files under a data root.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{info, warn};

use crate::config::{Config, normalize_extension};
use crate::error::FileProcessingError;

/// Extension of files subject to the filename language-marker exclusion.
const DOCX_EXTENSION: &str = ".docx";

/// Files discovered by a scan, grouped by lowercase extension (with leading dot).
///
/// Every supported extension has an entry, possibly empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub files: BTreeMap<String, Vec<PathBuf>>,
    /// Files that were seen but not selected (unsupported or excluded).
    pub skipped: usize,
}

impl ScanResult {
    /// Total number of selected files.
    #[must_use]
    pub fn total(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Selected files as `(extension, path)` pairs in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.files
            .iter()
            .flat_map(|(ext, paths)| paths.iter().map(move |p| (ext.as_str(), p.as_path())))
    }
}

pub struct CorpusScanner {
    supported: Vec<String>,
    excluded_docx_markers: Vec<String>,
}

impl CorpusScanner {
    pub fn new(supported: &[String], excluded_docx_markers: &[String]) -> Self {
        Self {
            supported: supported.iter().map(|e| normalize_extension(e)).collect(),
            excluded_docx_markers: excluded_docx_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.supported_extensions, &config.excluded_docx_markers)
    }

    /// Recursively enumerate `root` (following symlinks) and keep supported files.
    ///
    /// Paths are absolute and sorted within each extension.
    pub fn scan(&self, root: &Path) -> Result<ScanResult, FileProcessingError> {
        if !root.exists() {
            return Err(FileProcessingError::MissingDirectory(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(FileProcessingError::NotADirectory(root.to_path_buf()));
        }

        let root = std::path::absolute(root).map_err(|source| FileProcessingError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut result = ScanResult {
            files: self
                .supported
                .iter()
                .map(|ext| (ext.clone(), Vec::new()))
                .collect(),
            skipped: 0,
        };
        let mut seen = 0usize;

        // No gitignore/hidden filtering: the corpus is taken as-is.
        let walker = WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(true)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            seen += 1;

            let path = entry.path();
            match self.classify(path) {
                Some(ext) => {
                    if let Some(paths) = result.files.get_mut(&ext) {
                        paths.push(path.to_path_buf());
                    }
                }
                None => result.skipped += 1,
            }
        }

        for paths in result.files.values_mut() {
            paths.sort();
        }

        info!("Found {seen} files in {}", root.display());
        info!(
            "Filtered files: {} supported, {} unsupported",
            result.total(),
            result.skipped
        );

        Ok(result)
    }

    /// Return the normalized extension if `path` should be ingested.
    fn classify(&self, path: &Path) -> Option<String> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        let ext = normalize_extension(ext);
        if !self.supported.contains(&ext) {
            return None;
        }
        if ext == DOCX_EXTENSION && self.has_excluded_marker(path) {
            return None;
        }
        Some(ext)
    }

    fn has_excluded_marker(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.excluded_docx_markers
            .iter()
            .any(|marker| name.contains(marker.as_str()))
    }
}
