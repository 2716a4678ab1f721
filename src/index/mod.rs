//! Vector index over chunk embeddings, backed by SQLite and sqlite-vec.
//!
//! One database holds both structures: the `vec_chunks` vec0 table maps an
//! integer id to its embedding, and `chunks`/`documents` map the same id to
//! chunk text and provenance. Ids are assigned 1..=N at build time.
//!
//! An index is built in memory ([`VectorIndex::build`]), written out as an
//! atomic snapshot directory ([`VectorIndex::save`]) and served from a
//! read-only connection ([`VectorIndex::load`]).
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;

pub mod build;
pub mod models;
pub mod search;
pub mod snapshot;

pub use models::{Chunk, SearchHit, StoredChunk};
pub use snapshot::IndexManifest;

static INIT_VEC: Once = Once::new();

/// Register the sqlite-vec extension for every new connection. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

fn schema_sql(dimension: usize) -> String {
    format!(
        r#"
CREATE TABLE documents (
    id INTEGER PRIMARY KEY,
    source TEXT NOT NULL UNIQUE
);

CREATE TABLE chunks (
    id INTEGER PRIMARY KEY,
    document_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    token_count INTEGER NOT NULL,
    content TEXT NOT NULL,
    FOREIGN KEY (document_id) REFERENCES documents(id)
);

CREATE INDEX idx_chunks_document ON chunks(document_id);

CREATE VIRTUAL TABLE vec_chunks USING vec0(
    embedding float[{dimension}]
);
"#
    )
}

/// Chunk vectors plus the metadata store, sharing one id space.
///
/// Immutable once built or loaded; queries only read. The connection sits
/// behind a mutex so a loaded index can be shared across threads.
pub struct VectorIndex {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl VectorIndex {
    /// Embedding dimension of every vector in the index.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Queries never leave the connection half-modified
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of chunks in the metadata store.
    pub fn len(&self) -> rusqlite::Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT count(*) FROM chunks", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> rusqlite::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn document_count(&self) -> rusqlite::Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT count(*) FROM documents", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// All chunk ids in ascending order.
    pub fn chunk_ids(&self) -> rusqlite::Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM chunks ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Distinct document sources in ascending order.
    pub fn sources(&self) -> rusqlite::Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT source FROM documents ORDER BY source")?;
        let sources = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(sources)
    }
}

/// Serialize a float32 vector into the little-endian blob vec0 expects.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
