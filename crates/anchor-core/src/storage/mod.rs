mod config;
pub mod database;
mod kv;

pub use config::{Config, RitualSettings, SyncConfig};
pub use database::Database;
pub use kv::{KeyValueStore, MemoryKvStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/anchor[-dev]/` based on ANCHOR_ENV.
///
/// Set ANCHOR_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ANCHOR_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("anchor-dev")
    } else {
        base_dir.join("anchor")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
