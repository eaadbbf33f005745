mod config;
pub mod database;

pub use config::{Config, LoggingConfig, MonitorConfig, ProtocolConfig};
pub use database::SettingsDb;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/deadswitch[-dev]/` based on DEADSWITCH_ENV.
///
/// Set DEADSWITCH_ENV=dev to use the development data directory, or
/// DEADSWITCH_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("DEADSWITCH_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("DEADSWITCH_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("deadswitch-dev")
            } else {
                base_dir.join("deadswitch")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
