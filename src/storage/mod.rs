pub mod archive;
pub mod repository;

pub use archive::{ArchiveImport, ImportFile, ImportReport};

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

/// Database wraps a single synchronous `rusqlite::Connection` holding the
/// archived report tables, goal definitions and configuration.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at the default path (`~/.metricsdw/metricsdw.db`).
    pub fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".metricsdw");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("metricsdw.db"))
    }

    /// Open the database at the given path.
    pub fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())?;
        Self::init(&mut conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::init(&mut conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &mut Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA foreign_keys=ON;\
             PRAGMA busy_timeout=5000;",
        )?;
        let migrations = Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))]);
        migrations.to_latest(conn)?;
        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
