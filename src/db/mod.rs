//! SQLite-backed directory storage.
//!
//! The database lives at `~/.rollbook/rollbook.db` and is the durable layer
//! for members, guests, scan snapshots, and accounts. Every query is scoped
//! to an owner id; the merge logic on top (services) only ever touches the
//! narrow CRUD surface defined here, so swapping the backing store would not
//! disturb reconciliation semantics.

use std::path::PathBuf;

use rusqlite::{params, Connection};
use thiserror::Error;

mod guests;
mod members;
mod scans;
mod users;

pub use members::MemberProfileUpdate;
pub use users::DbUser;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// SQLite connection wrapper for the attendance directory.
///
/// Intentionally NOT `Clone` or `Sync`: a [`crate::directory::Directory`]
/// holds it behind a `std::sync::Mutex`, which is all the arbitration the
/// single-writer-per-account model needs.
pub struct DirectoryDb {
    conn: Connection,
}

impl DirectoryDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at `~/.rollbook/rollbook.db` and apply
    /// pending schema migrations.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.rollbook/rollbook.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".rollbook").join("rollbook.db"))
    }

    /// Delete every record belonging to `owner_id`: members, guests, and
    /// the scan snapshot. Account records are untouched.
    pub fn clear_owner_data(&self, owner_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM members WHERE owner_id = ?1", params![owner_id])?;
        self.conn
            .execute("DELETE FROM guests WHERE owner_id = ?1", params![owner_id])?;
        self.conn
            .execute("DELETE FROM scans WHERE owner_id = ?1", params![owner_id])?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, DirectoryDb) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = DirectoryDb::open_at(dir.path().join("test.db")).expect("open test database");
    (dir, db)
}
