use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use super::{SequenceStore, StoredSequence};
use crate::error::Result;
use crate::types::Matrix;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS sequences (
    id TEXT PRIMARY KEY,
    occupation TEXT NOT NULL,
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    data BLOB NOT NULL
);";

/// Sequences in a single SQLite table, matrices stored as little-endian
/// `f32` blobs.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Inserts or replaces the entry for `id`.
    pub fn insert(&self, id: &str, matrix: &Matrix, label: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sequences (id, occupation, rows, cols, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                label,
                matrix.rows() as i64,
                matrix.cols() as i64,
                matrix.to_le_bytes()
            ],
        )?;
        Ok(())
    }

    /// Inserts many entries in one transaction.
    pub fn insert_all<'a, I>(&mut self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a Matrix, &'a str)>,
    {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO sequences (id, occupation, rows, cols, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (id, matrix, label) in entries {
                stmt.execute(params![
                    id,
                    label,
                    matrix.rows() as i64,
                    matrix.cols() as i64,
                    matrix.to_le_bytes()
                ])?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Number of stored sequences.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sequences", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl SequenceStore for SqliteStore {
    fn fetch(&self, id: &str) -> Result<Option<StoredSequence>> {
        let row = self
            .conn
            .query_row(
                "SELECT occupation, rows, cols, data FROM sequences WHERE id = ?1",
                [id],
                |row| {
                    let label: String = row.get(0)?;
                    let rows: i64 = row.get(1)?;
                    let cols: i64 = row.get(2)?;
                    let data: Vec<u8> = row.get(3)?;
                    Ok((label, rows, cols, data))
                },
            )
            .optional()?;

        let Some((label, rows, cols, data)) = row else {
            return Ok(None);
        };
        Ok(Some(StoredSequence {
            matrix: Matrix::from_le_bytes(rows as usize, cols as usize, &data)?,
            label: Some(label),
        }))
    }

    fn describe(&self) -> String {
        match self.conn.path() {
            Some(path) if !path.is_empty() => format!("sqlite database {path}"),
            _ => "in-memory sqlite database".to_string(),
        }
    }
}
