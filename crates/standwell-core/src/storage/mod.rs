mod config;
pub mod database;
pub mod migrations;

pub use config::{
    CalendarConfig, Config, NotificationsConfig, NudgesConfig, PostureConfig, ScheduleConfig,
};
pub use database::{Database, SNAPSHOT_KEY};

use std::path::PathBuf;

use crate::error::{CoreError, Result};

/// Returns `~/.config/standwell[-dev]/` based on STANDWELL_ENV.
///
/// Set STANDWELL_ENV=dev to use the development data directory, or
/// STANDWELL_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("STANDWELL_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STANDWELL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("standwell-dev")
            } else {
                base_dir.join("standwell")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|_| CoreError::DataDir(dir.clone()))?;
    Ok(dir)
}
