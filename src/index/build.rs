use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::info;

use super::models::Chunk;
use super::{VectorIndex, init_sqlite_vec, schema_sql, serialize_vector};
use crate::error::IndexingError;

impl VectorIndex {
    /// Build an in-memory index over `chunks`.
    ///
    /// Chunk `i` (0-based) gets id `i + 1`. Every embedding must have
    /// exactly `dimension` components.
    pub fn build(dimension: usize, chunks: &[Chunk]) -> Result<Self, IndexingError> {
        if chunks.is_empty() {
            return Err(IndexingError::NoChunks);
        }
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dimension) {
            return Err(IndexingError::DimensionMismatch {
                expected: dimension,
                actual: bad.embedding.len(),
            });
        }

        init_sqlite_vec();
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&schema_sql(dimension))?;

        let tx = conn.transaction()?;
        let mut doc_ids: HashMap<&str, i64> = HashMap::new();
        {
            let mut insert_doc = tx.prepare("INSERT INTO documents (id, source) VALUES (?1, ?2)")?;
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks (id, document_id, position, token_count, content) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut insert_vec =
                tx.prepare("INSERT INTO vec_chunks (rowid, embedding) VALUES (?1, ?2)")?;

            for (i, chunk) in chunks.iter().enumerate() {
                let id = i as i64 + 1;

                let doc_id = match doc_ids.get(chunk.source.as_str()) {
                    Some(&doc_id) => doc_id,
                    None => {
                        let doc_id = doc_ids.len() as i64 + 1;
                        insert_doc.execute(params![doc_id, chunk.source])?;
                        doc_ids.insert(chunk.source.as_str(), doc_id);
                        doc_id
                    }
                };

                insert_chunk.execute(params![
                    id,
                    doc_id,
                    chunk.position as i64,
                    chunk.token_count as i64,
                    chunk.text
                ])?;
                insert_vec.execute(params![id, serialize_vector(&chunk.embedding)])?;
            }
        }
        tx.commit()?;

        info!(
            "Built vector index: {} chunks from {} documents (dimension {})",
            chunks.len(),
            doc_ids.len(),
            dimension
        );

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }
}
