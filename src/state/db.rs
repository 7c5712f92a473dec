//! State Database
//!
//! SQLite file shared by the credential store and the token ledger.
//! Every operation opens its own connection, so requests touching
//! different rows never wait on a lock held inside this process.

use std::path::{Path, PathBuf};
use std::time::Duration;
use rusqlite::Connection;

use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the on-disk state database
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Create or open the database and initialize its schema
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let db = Self {
            path: data_dir.join("drive.db"),
        };

        let conn = db.connect()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::trace!("journal_mode = {}", mode);
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tokens (
                token TEXT PRIMARY KEY,
                tier TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;

        tracing::debug!("State database ready at {:?}", db.path);
        Ok(db)
    }

    /// Open a fresh connection
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_schema() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        assert!(db.path().exists());

        let conn = db.connect().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('config', 'tokens')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempdir().unwrap();
        Database::open(dir.path()).unwrap();
        Database::open(dir.path()).unwrap();
    }
}
