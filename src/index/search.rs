use rusqlite::params;

use super::models::{SearchHit, StoredChunk};
use super::{VectorIndex, serialize_vector};

fn map_hit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchHit> {
    let chunk = StoredChunk {
        id: row.get(0)?,
        text: row.get(1)?,
        source: row.get(2)?,
        position: row.get::<_, i64>(3)? as usize,
        token_count: row.get::<_, i64>(4)? as usize,
    };
    Ok(SearchHit::new(chunk, row.get(5)?))
}

impl VectorIndex {
    /// Exact k-nearest-neighbour search by L2 distance.
    ///
    /// Scans every vector, so results are exact and deterministic: ascending
    /// distance, ties broken by ascending chunk id. Returns `min(k, len)` hits.
    /// The caller checks that `query` has [`VectorIndex::dimension`] components.
    pub fn search(&self, query: &[f32], k: usize) -> rusqlite::Result<Vec<SearchHit>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT
                c.id,
                c.content,
                d.source,
                c.position,
                c.token_count,
                vec_distance_l2(v.embedding, ?1) AS distance
            FROM vec_chunks v
            JOIN chunks c ON c.id = v.rowid
            JOIN documents d ON d.id = c.document_id
            ORDER BY distance ASC, c.id ASC
            LIMIT ?2
            "#,
        )?;

        let hits = stmt
            .query_map(params![serialize_vector(query), k as i64], map_hit_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hits)
    }

    /// Look up one chunk by id.
    pub fn get_chunk(&self, id: i64) -> rusqlite::Result<Option<StoredChunk>> {
        use rusqlite::OptionalExtension;

        self.conn()
            .query_row(
                r#"
                SELECT c.id, c.content, d.source, c.position, c.token_count
                FROM chunks c
                JOIN documents d ON d.id = c.document_id
                WHERE c.id = ?1
                "#,
                params![id],
                |row| {
                    Ok(StoredChunk {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        source: row.get(2)?,
                        position: row.get::<_, i64>(3)? as usize,
                        token_count: row.get::<_, i64>(4)? as usize,
                    })
                },
            )
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build::tests::chunk;

    fn axis_index() -> VectorIndex {
        let chunks = vec![
            chunk("a.pdf", 0, "x", vec![1.0, 0.0, 0.0]),
            chunk("a.pdf", 1, "y", vec![0.0, 1.0, 0.0]),
            chunk("b.docx", 0, "z", vec![0.0, 0.0, 1.0]),
            chunk("b.docx", 1, "xy", vec![0.6, 0.8, 0.0]),
        ];
        VectorIndex::build(3, &chunks).unwrap()
    }

    #[test]
    fn test_nearest_first() {
        let index = axis_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 4).unwrap();

        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].chunk.id, 1);
        assert_eq!(hits[0].chunk.source, "a.pdf");
        assert!(hits[0].distance.abs() < 1e-6);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        // (0.6, 0.8) is closer to the x axis than y or z
        assert_eq!(hits[1].chunk.id, 4);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_k_limits_results() {
        let index = axis_index();
        assert_eq!(index.search(&[0.0, 1.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[0.0, 1.0, 0.0], 50).unwrap().len(), 4);
    }

    #[test]
    fn test_ties_break_on_id() {
        let index = axis_index();
        // y and z are equidistant from the x axis
        let hits = index.search(&[1.0, 0.0, 0.0], 4).unwrap();
        assert_eq!(hits[2].chunk.id, 2);
        assert_eq!(hits[3].chunk.id, 3);
        assert_eq!(hits[2].distance, hits[3].distance);
    }

    #[test]
    fn test_get_chunk() {
        let index = axis_index();
        let stored = index.get_chunk(3).unwrap().unwrap();
        assert_eq!(stored.text, "z");
        assert_eq!(stored.source, "b.docx");
        assert!(index.get_chunk(99).unwrap().is_none());
    }
}
