//! SQLite persistence for profiles, configuration history and the settings
//! pointer.
//!
//! A single [`Database`] handle is shared by the domain stores. Writes are
//! serialized through one connection, which also guarantees that snapshot
//! append order matches call order for any one profile.

mod profiles;
mod schema;
mod settings;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension};

use crate::error::{EngineError, EngineResult};

pub use profiles::{Profile, ProfileStore, SnapshotInfo};
pub use settings::{SettingsPointer, SettingsStore};

/// SQLite database handle.
///
/// Thread-safe via `parking_lot::Mutex`. Domain stores clone this handle and
/// acquire the connection per operation.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database.
    pub fn open(db_path: &Path) -> EngineResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Store(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;

        // WAL for read concurrency, FULL sync for durability, foreign keys
        // so profile deletion cascades to its configuration history.
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=5000;
            ",
        )?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the database connection.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn init_schema(conn: &Connection) -> EngineResult<()> {
        conn.execute_batch(schema::SCHEMA_VERSION_TABLE)?;

        let current_version: Option<i32> = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match current_version {
            None => Self::apply_full_schema(conn),
            Some(v) if v == schema::SCHEMA_VERSION => Ok(()),
            Some(v) => Err(EngineError::Store(format!(
                "schema version mismatch: database has v{v}, process expects v{}",
                schema::SCHEMA_VERSION
            ))),
        }
    }

    fn apply_full_schema(conn: &Connection) -> EngineResult<()> {
        for sql in schema::all_schemas() {
            conn.execute_batch(sql)?;
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO schema_version (id, version, updated_at) VALUES (1, ?1, ?2)",
            rusqlite::params![schema::SCHEMA_VERSION, now],
        )?;

        tracing::info!(
            "Initialized database schema version {}",
            schema::SCHEMA_VERSION
        );
        Ok(())
    }
}

/// Paths are stored as text columns.
pub(crate) fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
