//! Database schema definitions.
//!
//! Profiles carry queryable columns; configurations are an append-only
//! history with a composite index for latest-version reads. The settings
//! pointer is a singleton row so it survives profiles being created and
//! deleted independently.

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema version tracking table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Profile records. `name` is unique across all profiles.
pub const PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    config_path TEXT NOT NULL,
    backup_path TEXT NOT NULL,
    client_path TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_profiles_created_at ON profiles(created_at);
"#;

/// Configuration history. Rows are immutable once written; a profile's
/// current configuration is the newest row for its id. Deleting a profile
/// cascades here.
pub const CONFIGURATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS configurations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_configurations_profile
    ON configurations(profile_id, created_at);
"#;

/// Currently effective paths. Not a foreign key into profiles.
pub const SETTINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    config_path TEXT NOT NULL,
    backup_path TEXT NOT NULL,
    client_path TEXT
);
"#;

/// Get all schema creation statements.
pub fn all_schemas() -> Vec<&'static str> {
    vec![
        SCHEMA_VERSION_TABLE,
        PROFILES_TABLE,
        CONFIGURATIONS_TABLE,
        SETTINGS_TABLE,
    ]
}
