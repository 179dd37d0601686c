//! Vector index using SQLite and sqlite-vec
use rusqlite::{Connection, Result};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use tracing::info;

pub mod index;
pub mod records;
pub mod search;

pub use index::SqliteVecIndex;
pub use records::NewRecord;

fn schema_sql(dimensions: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    content TEXT NOT NULL,
    contains_image INTEGER NOT NULL DEFAULT 0,
    image_blob_path TEXT,
    indexed_at DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_file_name ON records(file_name);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_records USING vec0(
    embedding FLOAT[{dimensions}]
);
"#
    )
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A wrapper around a SQLite connection initialized with sqlite-vec and the record schema.
pub struct Db {
    pub(crate) conn: Connection,
    dimensions: usize,
}

impl Db {
    /// Open a database at the given path and initialize the schema.
    ///
    /// `dimensions` fixes the width of the `vec_records` table on first creation.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing vector index: {}", path.display());

        // Register sqlite-vec extension globally
        init_sqlite_vec();

        let conn = Connection::open(path)?;
        Self::init(conn, dimensions)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch(&schema_sql(dimensions))?;

        Ok(Self { conn, dimensions })
    }

    /// Width of stored and query vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual table
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let db = Db::open_in_memory(8).expect("Failed to open in-memory DB");

        let tables: usize = db
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('records', 'vec_records');",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(tables, 2);
        assert_eq!(db.dimensions(), 8);
    }

    #[test]
    fn test_db_reopen_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("vectors.db");
        {
            let mut db = Db::open(&path, 3).unwrap();
            db.insert_record(&NewRecord::text("a.txt", "hello"), &[1.0, 0.0, 0.0])
                .unwrap();
        }
        let db = Db::open(&path, 3).unwrap();
        assert_eq!(db.count_records().unwrap(), 1);
    }

    #[test]
    fn test_serialize_vector() {
        let vec = vec![1.0, 2.0, -3.5];
        let bytes = serialize_vector(&vec);
        assert_eq!(bytes.len(), 12);

        // 1.0f32 in hex: 0x3f800000 -> little endian: 00 00 80 3f
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        // -3.5f32 in hex: 0xc0600000 -> little endian: 00 00 60 c0
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x60, 0xc0]);
    }
}
