//! Profile records and their append-only configuration history.
//!
//! Snapshots are never updated in place. Every save is a new row and the
//! profile's current configuration is the newest row, so the full version
//! history stays reconstructible.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use super::{Database, path_str};
use crate::document::{self, Document};
use crate::error::{EngineError, EngineResult};

/// A named association between a configuration file, a backup directory and
/// an optional companion client executable.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub config_path: PathBuf,
    pub backup_path: PathBuf,
    pub client_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable version in a profile's configuration history.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub id: i64,
    pub profile_id: i64,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct ProfileStore {
    db: Database,
}

impl ProfileStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a profile. Fails when the name is already taken.
    pub fn create_profile(
        &self,
        name: &str,
        config_path: &Path,
        backup_path: &Path,
        client_path: Option<&Path>,
    ) -> EngineResult<i64> {
        let conn = self.db.conn();

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(EngineError::DuplicateName(name.to_string()));
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO profiles (name, config_path, backup_path, client_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                name,
                path_str(config_path),
                path_str(backup_path),
                client_path.map(path_str),
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_profile(&self, id: i64) -> EngineResult<Option<Profile>> {
        let conn = self.db.conn();
        let profile = conn
            .query_row(
                "SELECT id, name, config_path, backup_path, client_path, created_at, updated_at
                 FROM profiles WHERE id = ?1",
                params![id],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    pub fn find_by_name(&self, name: &str) -> EngineResult<Option<Profile>> {
        let conn = self.db.conn();
        let profile = conn
            .query_row(
                "SELECT id, name, config_path, backup_path, client_path, created_at, updated_at
                 FROM profiles WHERE name = ?1",
                params![name],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// All profiles, newest-created first.
    pub fn list_profiles(&self) -> EngineResult<Vec<Profile>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, config_path, backup_path, client_path, created_at, updated_at
             FROM profiles ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], profile_from_row)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    /// Append a configuration snapshot. The text is stored as given; callers
    /// validate before or after per their flow.
    pub fn save_configuration(&self, profile_id: i64, content: &str) -> EngineResult<i64> {
        let conn = self.db.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO configurations (profile_id, content, created_at) VALUES (?1, ?2, ?3)",
            params![profile_id, content, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The newest snapshot's content, or `None` when the profile has never
    /// been given a configuration. The id tiebreak keeps append order
    /// authoritative for snapshots landing within the same second.
    pub fn get_latest_configuration(&self, profile_id: i64) -> EngineResult<Option<String>> {
        let conn = self.db.conn();
        let content = conn
            .query_row(
                "SELECT content FROM configurations WHERE profile_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![profile_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    /// A profile's version history, newest first.
    pub fn list_configurations(&self, profile_id: i64) -> EngineResult<Vec<SnapshotInfo>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, profile_id, created_at, length(content)
             FROM configurations WHERE profile_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![profile_id], |row| {
            let created_at: String = row.get(2)?;
            Ok(SnapshotInfo {
                id: row.get(0)?,
                profile_id: row.get(1)?,
                created_at: parse_ts(2, &created_at)?,
                size_bytes: row.get::<_, i64>(3)? as u64,
            })
        })?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }

    /// Delete a profile and, via cascade, its whole configuration history.
    /// Idempotent: deleting an unknown id is a no-op.
    pub fn delete_profile(&self, id: i64) -> EngineResult<()> {
        let conn = self.db.conn();
        let rows = conn.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
        if rows > 0 {
            info!(profile_id = id, "Deleted profile");
        }
        Ok(())
    }

    /// Update the three path fields. Snapshots are untouched.
    pub fn update_profile_paths(
        &self,
        id: i64,
        config_path: &Path,
        backup_path: &Path,
        client_path: Option<&Path>,
    ) -> EngineResult<()> {
        let conn = self.db.conn();
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE profiles SET config_path = ?2, backup_path = ?3, client_path = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                path_str(config_path),
                path_str(backup_path),
                client_path.map(path_str),
                now,
            ],
        )?;
        if rows == 0 {
            return Err(EngineError::ProfileNotFound(id));
        }
        Ok(())
    }

    /// First-run rule: an empty store gets a "Default" profile pointing at
    /// the conventional client config location, seeded with whatever valid
    /// configuration already lives there (verbatim), else an empty document.
    pub fn bootstrap(
        &self,
        default_config: &Path,
        default_backup: &Path,
    ) -> EngineResult<Option<i64>> {
        let count: i64 = {
            let conn = self.db.conn();
            conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?
        };
        if count > 0 {
            return Ok(None);
        }

        let seed = match std::fs::read_to_string(default_config) {
            Ok(text) if document::parse(&text).is_ok() => text,
            _ => document::serialize(&Document::empty())?,
        };

        let id = self.create_profile("Default", default_config, default_backup, None)?;
        self.save_configuration(id, &seed)?;
        info!(profile_id = id, config = %default_config.display(), "Created Default profile on first run");
        Ok(Some(id))
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Profile {
        id: row.get(0)?,
        name: row.get(1)?,
        config_path: PathBuf::from(row.get::<_, String>(2)?),
        backup_path: PathBuf::from(row.get::<_, String>(3)?),
        client_path: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
        created_at: parse_ts(5, &created_at)?,
        updated_at: parse_ts(6, &updated_at)?,
    })
}

fn parse_ts(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, ProfileStore) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, ProfileStore::new(db))
    }

    #[test]
    fn test_create_and_get_profile() {
        let (_dir, store) = test_store();
        let id = store
            .create_profile(
                "Work",
                Path::new("/tmp/cfg.json"),
                Path::new("/tmp/backups"),
                Some(Path::new("/usr/bin/client")),
            )
            .unwrap();

        let profile = store.get_profile(id).unwrap().unwrap();
        assert_eq!(profile.name, "Work");
        assert_eq!(profile.config_path, PathBuf::from("/tmp/cfg.json"));
        assert_eq!(profile.backup_path, PathBuf::from("/tmp/backups"));
        assert_eq!(profile.client_path, Some(PathBuf::from("/usr/bin/client")));
        assert_eq!(profile.created_at, profile.updated_at);
    }

    #[test]
    fn test_get_profile_missing() {
        let (_dir, store) = test_store();
        assert!(store.get_profile(42).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (_dir, store) = test_store();
        store
            .create_profile("Work", Path::new("/a"), Path::new("/b"), None)
            .unwrap();
        let err = store
            .create_profile("Work", Path::new("/c"), Path::new("/d"), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName(name) if name == "Work"));
        assert_eq!(store.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_list_profiles_newest_first() {
        let (_dir, store) = test_store();
        let a = store
            .create_profile("A", Path::new("/a"), Path::new("/b"), None)
            .unwrap();
        let b = store
            .create_profile("B", Path::new("/a"), Path::new("/b"), None)
            .unwrap();

        let profiles = store.list_profiles().unwrap();
        // Created within the same second; the id tiebreak keeps creation order.
        assert_eq!(profiles[0].id, b);
        assert_eq!(profiles[1].id, a);
    }

    #[test]
    fn test_latest_configuration_is_newest_append() {
        let (_dir, store) = test_store();
        let id = store
            .create_profile("A", Path::new("/a"), Path::new("/b"), None)
            .unwrap();

        assert!(store.get_latest_configuration(id).unwrap().is_none());

        store.save_configuration(id, "first").unwrap();
        store.save_configuration(id, "second").unwrap();
        assert_eq!(
            store.get_latest_configuration(id).unwrap().as_deref(),
            Some("second")
        );

        let history = store.list_configurations(id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].created_at >= history[1].created_at);
        assert_eq!(history[0].size_bytes, "second".len() as u64);
    }

    #[test]
    fn test_delete_profile_cascades_to_history() {
        let (_dir, store) = test_store();
        let id = store
            .create_profile("A", Path::new("/a"), Path::new("/b"), None)
            .unwrap();
        store.save_configuration(id, "content").unwrap();

        store.delete_profile(id).unwrap();
        assert!(store.get_profile(id).unwrap().is_none());
        assert!(store.get_latest_configuration(id).unwrap().is_none());
        assert!(store.list_configurations(id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_profile_idempotent() {
        let (_dir, store) = test_store();
        store.delete_profile(999).unwrap();
    }

    #[test]
    fn test_update_profile_paths() {
        let (_dir, store) = test_store();
        let id = store
            .create_profile("A", Path::new("/a"), Path::new("/b"), None)
            .unwrap();
        store.save_configuration(id, "kept").unwrap();

        store
            .update_profile_paths(
                id,
                Path::new("/new/cfg.json"),
                Path::new("/new/backups"),
                Some(Path::new("/new/client")),
            )
            .unwrap();

        let profile = store.get_profile(id).unwrap().unwrap();
        assert_eq!(profile.config_path, PathBuf::from("/new/cfg.json"));
        assert_eq!(profile.client_path, Some(PathBuf::from("/new/client")));
        // History untouched.
        assert_eq!(
            store.get_latest_configuration(id).unwrap().as_deref(),
            Some("kept")
        );
    }

    #[test]
    fn test_update_profile_paths_missing() {
        let (_dir, store) = test_store();
        let err = store
            .update_profile_paths(7, Path::new("/a"), Path::new("/b"), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::ProfileNotFound(7)));
    }

    #[test]
    fn test_bootstrap_creates_default_profile() {
        let (dir, store) = test_store();
        let config = dir.path().join("missing.json");

        let id = store
            .bootstrap(&config, &dir.path().join("backups"))
            .unwrap()
            .unwrap();

        let profiles = store.list_profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "Default");

        let seed = store.get_latest_configuration(id).unwrap().unwrap();
        assert!(document::parse(&seed).unwrap().is_effectively_empty());
    }

    #[test]
    fn test_bootstrap_seeds_existing_content_verbatim() {
        let (dir, store) = test_store();
        let config = dir.path().join("cfg.json");
        let text = r#"{"mcpServers":{"files":{"command":"npx","args":[]}}}"#;
        fs::write(&config, text).unwrap();

        let id = store
            .bootstrap(&config, &dir.path().join("backups"))
            .unwrap()
            .unwrap();
        assert_eq!(
            store.get_latest_configuration(id).unwrap().as_deref(),
            Some(text)
        );
    }

    #[test]
    fn test_bootstrap_noop_when_profiles_exist() {
        let (dir, store) = test_store();
        store
            .create_profile("A", Path::new("/a"), Path::new("/b"), None)
            .unwrap();
        assert!(
            store
                .bootstrap(&dir.path().join("x.json"), &dir.path().join("backups"))
                .unwrap()
                .is_none()
        );
        assert_eq!(store.list_profiles().unwrap().len(), 1);
    }
}
