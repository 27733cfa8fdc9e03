//! Backup manager: timestamped, non-overwriting copies taken before any
//! destructive write to a live configuration file.
//!
//! Format-agnostic. The source is copied byte for byte and never inspected.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{EngineError, EngineResult};

pub struct BackupManager {
    /// Used when the caller has no backup directory configured.
    fallback_dir: PathBuf,
}

impl BackupManager {
    pub fn new(fallback_dir: PathBuf) -> Self {
        Self { fallback_dir }
    }

    /// Copy `source` into the backup directory under a timestamped name.
    ///
    /// The name is `<stem>_<UTC second stamp>.<ext>`; when that name is
    /// already taken a `-N` counter is appended, so an existing backup is
    /// never overwritten. The copy is staged to a temporary file and
    /// persisted by rename: a failed write leaves no partial backup behind.
    pub fn backup(&self, source: &Path, dir: Option<&Path>) -> EngineResult<PathBuf> {
        let dir = dir.unwrap_or(&self.fallback_dir);

        let data = fs::read(source).map_err(|e| EngineError::BackupFailed {
            path: source.to_path_buf(),
            detail: format!("failed to read source: {e}"),
        })?;

        fs::create_dir_all(dir).map_err(|e| EngineError::BackupFailed {
            path: dir.to_path_buf(),
            detail: format!("failed to create backup directory: {e}"),
        })?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let target = next_free_name(dir, source, &stamp);

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| EngineError::BackupFailed {
            path: target.clone(),
            detail: format!("failed to stage backup: {e}"),
        })?;
        staged
            .write_all(&data)
            .map_err(|e| EngineError::BackupFailed {
                path: target.clone(),
                detail: format!("failed to write backup: {e}"),
            })?;
        staged
            .persist_noclobber(&target)
            .map_err(|e| EngineError::BackupFailed {
                path: target.clone(),
                detail: format!("failed to persist backup: {e}"),
            })?;

        info!(source = %source.display(), backup = %target.display(), "Created backup");
        Ok(target)
    }
}

fn next_free_name(dir: &Path, source: &Path, stamp: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("backup");
    let ext = source.extension().and_then(|s| s.to_str());

    let mut counter = 0u32;
    loop {
        let name = match (counter, ext) {
            (0, Some(ext)) => format!("{stem}_{stamp}.{ext}"),
            (0, None) => format!("{stem}_{stamp}"),
            (n, Some(ext)) => format!("{stem}_{stamp}-{n}.{ext}"),
            (n, None) => format!("{stem}_{stamp}-{n}"),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
