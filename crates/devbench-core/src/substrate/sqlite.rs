use super::medium::{MediumError, StorageMedium};
use crate::constants::files;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed medium: one `kv` table, one row per physical key.
pub struct SqliteMedium {
    conn: Connection,
}

impl SqliteMedium {
    pub fn open(data_dir: &Path) -> Result<Self, MediumError> {
        std::fs::create_dir_all(data_dir).map_err(|source| MediumError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let conn = Connection::open(data_dir.join(files::SQLITE_STORAGE))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, MediumError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, MediumError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }
}

impl StorageMedium for SqliteMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), MediumError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), MediumError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, MediumError> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }

    fn usage_bytes(&self) -> Result<usize, MediumError> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM kv",
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as usize)
    }
}
