//! Error types used across the profile engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for engine and store operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Input document rejected at a strict entry point.
    #[error("invalid configuration document: {0}")]
    Validation(String),

    /// Text is not valid JSON of the expected shape.
    #[error("configuration parse error: {0}")]
    Parse(String),

    /// A stored snapshot failed to parse. This is a store-integrity problem
    /// and is never papered over with an empty document.
    #[error("stored configuration for profile {profile_id} is corrupt: {detail}")]
    CorruptConfiguration { profile_id: i64, detail: String },

    #[error("profile not found: {0}")]
    ProfileNotFound(i64),

    /// Profile exists but has never been given a configuration.
    #[error("profile {0} has no stored configuration")]
    NoConfiguration(i64),

    #[error("profile name already exists: {0}")]
    DuplicateName(String),

    /// Backup could not be created; the surrounding write is aborted.
    #[error("backup of {path} failed: {detail}")]
    BackupFailed { path: PathBuf, detail: String },

    /// The live configuration file could not be written.
    #[error("failed to write {path}: {detail}")]
    WriteIo { path: PathBuf, detail: String },

    /// Underlying persistence failure.
    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Store(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Internal(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}
