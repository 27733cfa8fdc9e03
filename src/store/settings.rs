//! Settings pointer: the singleton record of the currently effective
//! config/backup/client paths.
//!
//! Deliberately not tied to a profile id. Profiles can be created and
//! deleted independently while the pointer keeps naming concrete paths. It
//! is overwritten to the activated profile's paths as the last step of a
//! successful switch, and can also be edited directly.

use std::path::{Path, PathBuf};

use rusqlite::{OptionalExtension, params};

use super::{Database, path_str};
use crate::error::{EngineError, EngineResult};

/// The three currently effective paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPointer {
    pub config_path: PathBuf,
    pub backup_path: PathBuf,
    pub client_path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
}

impl SettingsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Seed the singleton row on first run; an existing row is untouched.
    pub fn ensure_defaults(&self, config_path: &Path, backup_path: &Path) -> EngineResult<()> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT OR IGNORE INTO settings (id, config_path, backup_path, client_path)
             VALUES (1, ?1, ?2, NULL)",
            params![path_str(config_path), path_str(backup_path)],
        )?;
        Ok(())
    }

    pub fn get(&self) -> EngineResult<SettingsPointer> {
        let conn = self.db.conn();
        let pointer = conn
            .query_row(
                "SELECT config_path, backup_path, client_path FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(SettingsPointer {
                        config_path: PathBuf::from(row.get::<_, String>(0)?),
                        backup_path: PathBuf::from(row.get::<_, String>(1)?),
                        client_path: row.get::<_, Option<String>>(2)?.map(PathBuf::from),
                    })
                },
            )
            .optional()?;

        pointer.ok_or_else(|| EngineError::Store("settings row missing".to_string()))
    }

    /// Overwrite all three paths (profile activation).
    pub fn set_all(
        &self,
        config_path: &Path,
        backup_path: &Path,
        client_path: Option<&Path>,
    ) -> EngineResult<()> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO settings (id, config_path, backup_path, client_path)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 config_path = excluded.config_path,
                 backup_path = excluded.backup_path,
                 client_path = excluded.client_path",
            params![
                path_str(config_path),
                path_str(backup_path),
                client_path.map(path_str),
            ],
        )?;
        Ok(())
    }

    /// Partial update: only the provided fields change. The outer `Option`
    /// on `client_path` selects the field; the inner one clears it.
    pub fn update(
        &self,
        config_path: Option<&Path>,
        backup_path: Option<&Path>,
        client_path: Option<Option<&Path>>,
    ) -> EngineResult<SettingsPointer> {
        let mut current = self.get()?;
        if let Some(path) = config_path {
            current.config_path = path.to_path_buf();
        }
        if let Some(path) = backup_path {
            current.backup_path = path.to_path_buf();
        }
        if let Some(client) = client_path {
            current.client_path = client.map(Path::to_path_buf);
        }
        self.set_all(
            &current.config_path,
            &current.backup_path,
            current.client_path.as_deref(),
        )?;
        Ok(current)
    }
}
