//! Profile & configuration synchronization engine
//!
//! Orchestrates profile switch, creation, remix and raw-edit saves, keeping
//! three resources consistent: the versioned history store, the live file an
//! external client reads, and the settings pointer naming the active paths.
//! The live file is never overwritten without a successful backup first, and
//! the pointer only moves after the file write has succeeded.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::backup::BackupManager;
use crate::document::{self, Document};
use crate::error::{EngineError, EngineResult};
use crate::store::{ProfileStore, SettingsStore};

/// Per-path mutual exclusion handles, keyed by normalized absolute path.
/// One switch or save runs against a given live file at a time.
struct PathLocks {
    inner: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = normalize(path);
        self.inner.lock().entry(key).or_default().clone()
    }
}

/// Canonicalize when the file exists; otherwise fall back to the absolute
/// form so pre-creation and post-creation callers agree on the key.
fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Outcome of a switch or raw save, for the caller to display.
#[derive(Debug)]
pub struct SyncReport {
    /// The document as written to the live file.
    pub document: Document,
    /// Backup taken of the pre-existing live file, if there was one.
    pub backup: Option<PathBuf>,
    /// True when the merge-preserve rule substituted the live server map.
    pub merged_from_live: bool,
    /// Set when the file write succeeded but the history append did not.
    /// The file is the primary deliverable; the store is behind it.
    pub history_warning: Option<String>,
}

pub struct SyncEngine {
    store: ProfileStore,
    settings: SettingsStore,
    backups: BackupManager,
    locks: PathLocks,
}

impl SyncEngine {
    pub fn new(store: ProfileStore, settings: SettingsStore, backups: BackupManager) -> Self {
        Self {
            store,
            settings,
            backups,
            locks: PathLocks::new(),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Activate a profile: reconcile its stored configuration with the live
    /// file, backup-first, then point the settings at its paths.
    ///
    /// The merge outcome is appended back to the profile's history, so
    /// switching is not read-only with respect to versions.
    pub fn switch_to_profile(&self, id: i64) -> EngineResult<SyncReport> {
        let profile = self
            .store
            .get_profile(id)?
            .ok_or(EngineError::ProfileNotFound(id))?;
        let stored = self
            .store
            .get_latest_configuration(id)?
            .ok_or(EngineError::NoConfiguration(id))?;

        let mut incoming =
            document::parse(&stored).map_err(|e| EngineError::CorruptConfiguration {
                profile_id: id,
                detail: e.to_string(),
            })?;

        let lock = self.locks.handle(&profile.config_path);
        let _guard = lock.lock();

        let mut backup = None;
        let mut merged = false;

        if profile.config_path.exists() {
            // Never overwrite without a successful backup first.
            backup = Some(
                self.backups
                    .backup(&profile.config_path, Some(&profile.backup_path))?,
            );

            // Merge-preserve: a stored-but-empty configuration never erases a
            // non-empty live file. An unparsable live file reads as empty for
            // this comparison only; it is already backed up.
            let live = fs::read_to_string(&profile.config_path)
                .ok()
                .and_then(|text| document::parse(&text).ok())
                .unwrap_or_else(Document::empty);

            if incoming.is_effectively_empty() && !live.is_effectively_empty() {
                info!(
                    profile = %profile.name,
                    servers = live.servers.len(),
                    "Stored configuration is empty; preserving live server map"
                );
                incoming.servers = live.servers;
                merged = true;
            }
        }

        let text = document::serialize(&incoming)?;
        write_live_file(&profile.config_path, &text)?;

        // Pointer moves only after the file write has succeeded.
        self.settings.set_all(
            &profile.config_path,
            &profile.backup_path,
            profile.client_path.as_deref(),
        )?;

        let history_warning = self.append_history(id, &text);

        info!(
            profile = %profile.name,
            config = %profile.config_path.display(),
            merged = merged,
            "Switched profile"
        );
        Ok(SyncReport {
            document: incoming,
            backup,
            merged_from_live: merged,
            history_warning,
        })
    }

    /// Create a profile seeded from whatever valid, non-empty configuration
    /// already lives at `config_path`, falling back to an empty document.
    /// A duplicate name aborts before any snapshot is written.
    pub fn create_profile(
        &self,
        name: &str,
        config_path: &Path,
        backup_path: &Path,
        client_path: Option<&Path>,
    ) -> EngineResult<i64> {
        let seed = match fs::read_to_string(config_path) {
            Ok(text) => match document::parse(&text) {
                Ok(doc) if !doc.is_effectively_empty() => doc,
                _ => Document::empty(),
            },
            Err(_) => Document::empty(),
        };

        let id = self
            .store
            .create_profile(name, config_path, backup_path, client_path)?;
        self.store
            .save_configuration(id, &document::serialize(&seed)?)?;

        info!(profile = %name, profile_id = id, seeded = !seed.is_effectively_empty(), "Created profile");
        Ok(id)
    }

    /// Point-in-time clone: same three paths (copied, not shared), and the
    /// source's latest configuration as the new profile's first snapshot.
    /// The clone does not track the source afterwards.
    pub fn remix_profile(&self, source_id: i64, new_name: &str) -> EngineResult<i64> {
        let source = self
            .store
            .get_profile(source_id)?
            .ok_or(EngineError::ProfileNotFound(source_id))?;
        let snapshot = self
            .store
            .get_latest_configuration(source_id)?
            .ok_or(EngineError::NoConfiguration(source_id))?;

        let id = self.store.create_profile(
            new_name,
            &source.config_path,
            &source.backup_path,
            source.client_path.as_deref(),
        )?;
        self.store.save_configuration(id, &snapshot)?;

        info!(source = %source.name, remix = %new_name, profile_id = id, "Remixed profile");
        Ok(id)
    }

    /// Persist hand-edited configuration text: strict validation, mandatory
    /// backup of any existing file, verbatim write, then an optional history
    /// append when the active profile is known.
    pub fn save_raw(
        &self,
        text: &str,
        target_path: &Path,
        active_profile_id: Option<i64>,
    ) -> EngineResult<SyncReport> {
        // Unlike switch, a missing server map is not normalized away here.
        // The editing user must see the problem immediately.
        let doc = document::parse(text).map_err(|e| EngineError::Validation(e.to_string()))?;
        if doc.was_normalized() {
            return Err(EngineError::Validation(format!(
                "document has no '{}' object",
                crate::constants::client::SERVERS_KEY
            )));
        }

        let lock = self.locks.handle(target_path);
        let _guard = lock.lock();

        let mut backup = None;
        if target_path.exists() {
            let backup_dir = self.settings.get()?.backup_path;
            backup = Some(self.backups.backup(target_path, Some(&backup_dir))?);
        }

        write_live_file(target_path, text)?;

        let history_warning = match active_profile_id {
            Some(profile_id) => self.append_history(profile_id, text),
            None => None,
        };

        info!(target = %target_path.display(), "Saved raw configuration");
        Ok(SyncReport {
            document: doc,
            backup,
            merged_from_live: false,
            history_warning,
        })
    }

    /// Append after a successful file write. A failure here leaves the file
    /// ahead of the store; report it, do not undo the write.
    fn append_history(&self, profile_id: i64, text: &str) -> Option<String> {
        match self.store.save_configuration(profile_id, text) {
            Ok(_) => None,
            Err(e) => {
                warn!(profile_id = profile_id, error = %e, "File written but history append failed");
                Some(format!(
                    "configuration written but history append failed: {e}"
                ))
            }
        }
    }
}

fn write_live_file(path: &Path, text: &str) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::WriteIo {
            path: path.to_path_buf(),
            detail: format!("failed to create parent directory: {e}"),
        })?;
    }
    fs::write(path, text).map_err(|e| EngineError::WriteIo {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
