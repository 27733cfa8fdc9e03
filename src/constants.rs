//! Application-wide constants
//!
//! Single source of truth for directory names, file names and the
//! recognized configuration document shape.

use std::path::PathBuf;

/// Application storage layout (profile database, default backup location)
pub mod app {
    /// Directory under the platform data dir holding the profile database
    pub const DATA_DIR: &str = "mcp-profiles";

    /// SQLite database file name
    pub const DB_FILENAME: &str = "profiles.db";

    /// Default backup directory name, created under `DATA_DIR`
    pub const BACKUP_DIR: &str = "backups";
}

/// Live client configuration conventions
pub mod client {
    /// Directory under the platform config dir owned by the desktop client
    pub const CONFIG_DIR: &str = "Claude";

    /// Configuration file the client reads at startup
    pub const CONFIG_FILENAME: &str = "claude_desktop_config.json";

    /// Top-level key holding the server map
    pub const SERVERS_KEY: &str = "mcpServers";
}

/// Path of the profile database
pub fn database_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(app::DATA_DIR);
    path.push(app::DB_FILENAME);
    path
}

/// Default directory for configuration backups
pub fn default_backup_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(app::DATA_DIR);
    path.push(app::BACKUP_DIR);
    path
}

/// Platform-conventional location of the client configuration file
pub fn default_client_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(client::CONFIG_DIR);
    path.push(client::CONFIG_FILENAME);
    path
}
