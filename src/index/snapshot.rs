//! Snapshot persistence: one directory holding `index.db` and `manifest.json`.
//!
//! A save writes the complete snapshot into a staging directory next to the
//! target and then swaps it in with renames, so a reader sees either the old
//! snapshot or the new one, never a mix.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{VectorIndex, init_sqlite_vec};
use crate::error::IndexingError;

pub const DB_FILE: &str = "index.db";
pub const MANIFEST_FILE: &str = "manifest.json";
const FORMAT_VERSION: u32 = 1;

/// Metadata written next to the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    /// Embedding model the vectors were produced with.
    pub model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    /// Describe `index` as built with the given model and chunking parameters.
    pub fn describe(
        index: &VectorIndex,
        model: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, IndexingError> {
        Ok(Self {
            format_version: FORMAT_VERSION,
            model: model.to_string(),
            dimension: index.dimension(),
            chunk_count: index.len()?,
            document_count: index.document_count()?,
            chunk_size,
            chunk_overlap,
            created_at: Utc::now(),
        })
    }

    /// Read `manifest.json` from a snapshot directory.
    pub fn read(dir: &Path) -> Result<Self, IndexingError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(IndexingError::Incomplete {
                path: dir.to_path_buf(),
                reason: format!("{MANIFEST_FILE} is missing"),
            });
        }
        let content = fs::read_to_string(&path).map_err(|source| IndexingError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| IndexingError::Manifest { path, source })
    }

    fn write(&self, dir: &Path) -> Result<(), IndexingError> {
        let path = dir.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(self).map_err(|source| {
            IndexingError::Manifest {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, content).map_err(|source| IndexingError::Io { path, source })
    }
}

/// Whether `dir` looks like a snapshot (both files present).
#[must_use]
pub fn snapshot_exists(dir: &Path) -> bool {
    dir.join(DB_FILE).is_file() && dir.join(MANIFEST_FILE).is_file()
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> IndexingError + '_ {
    move |source| IndexingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `<parent>/.<name>.<suffix>` next to `dir`.
fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    let parent = dir.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{name}.{suffix}"))
}

/// Remove a replaced snapshot, logging instead of failing.
fn discard_backup(backup: &Path) -> bool {
    match fs::remove_dir_all(backup) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to remove previous index {}: {e}", backup.display());
            false
        }
    }
}

impl VectorIndex {
    /// Persist the index and `manifest` to `dir`, replacing any previous snapshot.
    pub fn save(&self, dir: &Path, manifest: &IndexManifest) -> Result<(), IndexingError> {
        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let staging = sibling(dir, "staging");
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(io_error(&staging))?;
        }
        fs::create_dir_all(&staging).map_err(io_error(&staging))?;

        let db_path = staging.join(DB_FILE);
        self.conn()
            .execute("VACUUM INTO ?1", [db_path.to_string_lossy().as_ref()])?;
        manifest.write(&staging)?;

        if dir.exists() {
            let backup = sibling(dir, "old");
            if backup.exists() {
                fs::remove_dir_all(&backup).map_err(io_error(&backup))?;
            }
            fs::rename(dir, &backup).map_err(io_error(dir))?;
            if let Err(e) = fs::rename(&staging, dir) {
                // Put the previous snapshot back before reporting
                if let Err(restore) = fs::rename(&backup, dir) {
                    warn!("Failed to restore previous index from {}: {restore}", backup.display());
                }
                return Err(io_error(dir)(e));
            }
            // The new snapshot is already live
            discard_backup(&backup);
        } else {
            fs::rename(&staging, dir).map_err(io_error(dir))?;
        }

        info!(
            "Saved index ({} chunks) to {}",
            manifest.chunk_count,
            dir.display()
        );
        Ok(())
    }

    /// Open a saved snapshot read-only.
    ///
    /// Fails if the directory is missing or incomplete, if the stored
    /// dimension differs from `expected_dimension`, or if vectors and chunks
    /// do not correspond one to one.
    pub fn load(
        dir: &Path,
        expected_dimension: usize,
        model: &str,
    ) -> Result<(Self, IndexManifest), IndexingError> {
        if !dir.is_dir() {
            return Err(IndexingError::MissingIndex(dir.to_path_buf()));
        }

        let manifest = IndexManifest::read(dir)?;
        if manifest.dimension != expected_dimension {
            return Err(IndexingError::DimensionMismatch {
                expected: expected_dimension,
                actual: manifest.dimension,
            });
        }
        if manifest.model != model {
            warn!(
                "Index was built with model '{}' but '{}' is configured",
                manifest.model, model
            );
        }

        let db_path = dir.join(DB_FILE);
        if !db_path.is_file() {
            return Err(IndexingError::Incomplete {
                path: dir.to_path_buf(),
                reason: format!("{DB_FILE} is missing"),
            });
        }

        init_sqlite_vec();
        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let index = Self {
            conn: Mutex::new(conn),
            dimension: manifest.dimension,
        };

        index.verify_consistency()?;
        let chunks = index.len()?;
        if chunks != manifest.chunk_count {
            return Err(IndexingError::Incomplete {
                path: dir.to_path_buf(),
                reason: format!(
                    "manifest lists {} chunks, database holds {}",
                    manifest.chunk_count, chunks
                ),
            });
        }
        match index.stored_dimension()? {
            Some(stored) if stored != manifest.dimension => {
                return Err(IndexingError::DimensionMismatch {
                    expected: manifest.dimension,
                    actual: stored,
                });
            }
            _ => {}
        }

        info!(
            "Loaded index from {}: {} chunks, {} documents",
            dir.display(),
            chunks,
            manifest.document_count
        );
        Ok((index, manifest))
    }

    /// Every chunk has a vector and every vector has a chunk.
    pub fn verify_consistency(&self) -> Result<(), IndexingError> {
        let conn = self.conn();
        let count = |sql: &str| -> rusqlite::Result<usize> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
        };

        let chunks = count("SELECT count(*) FROM chunks")?;
        let vectors = count("SELECT count(*) FROM vec_chunks")?;
        let missing_vectors = count(
            "SELECT count(*) FROM chunks c WHERE NOT EXISTS (SELECT 1 FROM vec_chunks v WHERE v.rowid = c.id)",
        )?;
        let missing_chunks = count(
            "SELECT count(*) FROM vec_chunks v WHERE NOT EXISTS (SELECT 1 FROM chunks c WHERE c.id = v.rowid)",
        )?;

        let orphans = missing_vectors + missing_chunks;
        if orphans > 0 || chunks != vectors {
            return Err(IndexingError::Inconsistent {
                chunks,
                vectors,
                orphans,
            });
        }
        Ok(())
    }

    /// Length of the first stored vector, if any.
    fn stored_dimension(&self) -> rusqlite::Result<Option<usize>> {
        use rusqlite::OptionalExtension;

        let len: Option<i64> = self
            .conn()
            .query_row(
                "SELECT vec_length(embedding) FROM vec_chunks LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(len.map(|n| n as usize))
    }
}
