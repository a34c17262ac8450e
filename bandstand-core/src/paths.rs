//! Path constants for configuration and state files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "bandstand";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the durable state database file
pub const STATE_DB_FILE_NAME: &str = "state.db";

/// Get the configuration directory path (~/.config/bandstand/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/bandstand/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the durable state database path (`~/.config/bandstand/state.db`)
#[must_use]
pub fn state_db_path() -> PathBuf {
    config_dir().join(STATE_DB_FILE_NAME)
}
