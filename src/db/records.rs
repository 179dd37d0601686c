use super::{Db, serialize_vector};
use chrono::Utc;
use rusqlite::{Result, params};

/// A record to place in the index together with its embedding.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub file_name: &'a str,
    pub content: &'a str,
    pub contains_image: bool,
    pub image_blob_path: Option<&'a str>,
}

impl<'a> NewRecord<'a> {
    pub fn text(file_name: &'a str, content: &'a str) -> Self {
        Self {
            file_name,
            content,
            contains_image: false,
            image_blob_path: None,
        }
    }

    pub fn with_image(file_name: &'a str, content: &'a str, image_blob_path: &'a str) -> Self {
        Self {
            file_name,
            content,
            contains_image: true,
            image_blob_path: Some(image_blob_path),
        }
    }
}

impl Db {
    /// Inserts a record and its vector in one transaction, returning the record id.
    pub fn insert_record(&mut self, record: &NewRecord<'_>, embedding: &[f32]) -> Result<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO records (file_name, content, contains_image, image_blob_path, indexed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                record.file_name,
                record.content,
                record.contains_image,
                record.image_blob_path,
                Utc::now()
            ],
        )?;
        let record_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO vec_records (rowid, embedding) VALUES (?, ?)",
            params![record_id, serialize_vector(embedding)],
        )?;

        tx.commit()?;
        Ok(record_id)
    }

    /// Number of indexed records.
    pub fn count_records(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
