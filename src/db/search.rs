use super::{Db, serialize_vector};
use crate::models::RetrievedRecord;
use rusqlite::{Result, params};

fn map_record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RetrievedRecord> {
    Ok(RetrievedRecord {
        file_name: row.get(0)?,
        content: row.get(1)?,
        contains_image: row.get(2)?,
        image_blob_path: row.get(3)?,
        similarity_score: row.get(4)?,
    })
}

impl Db {
    /// Cosine-similarity search, best match first.
    ///
    /// Only records whose similarity is strictly greater than `min_similarity`
    /// are returned, at most `top_k` of them.
    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievedRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT file_name, content, contains_image, image_blob_path, similarity
            FROM (
                SELECT
                    r.id,
                    r.file_name,
                    r.content,
                    r.contains_image,
                    r.image_blob_path,
                    1.0 - vec_distance_cosine(v.embedding, ?) AS similarity
                FROM vec_records v
                JOIN records r ON v.rowid = r.id
            )
            WHERE similarity > ?
            ORDER BY similarity DESC, id ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![serialize_vector(query_vector), min_similarity, top_k as i64],
            map_record_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }
}
