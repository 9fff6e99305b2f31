//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Remote anchor API endpoint and credentials
//! - Ritual defaults (preset, haptics, custom phase list)
//! - Log verbosity
//!
//! Configuration is stored at `~/.config/anchor/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, ValidationError};
use crate::ritual::RitualConfig;

/// Remote sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the anchor API, e.g. `https://api.example.com/v1`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How many active anchors the profile preview carries.
    #[serde(default = "default_profile_anchor_limit")]
    pub profile_anchor_limit: u32,
}

/// Ritual defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RitualSettings {
    #[serde(default = "default_preset")]
    pub default_preset: String,
    #[serde(default = "default_true")]
    pub haptics_enabled: bool,
    /// Custom ritual used instead of the preset when set.
    #[serde(default)]
    pub custom: Option<RitualConfig>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/anchor/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub ritual: RitualSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_profile_anchor_limit() -> u32 {
    5
}
fn default_preset() -> String {
    "quick_charge".into()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_secs: default_timeout_secs(),
            profile_anchor_limit: default_profile_anchor_limit(),
        }
    }
}

impl Default for RitualSettings {
    fn default() -> Self {
        Self {
            default_preset: default_preset(),
            haptics_enabled: true,
            custom: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            ritual: RitualSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl RitualSettings {
    /// Resolve the ritual to run: the custom one if present, otherwise the
    /// named preset (`name` overrides `default_preset`).
    pub fn resolve(&self, name: Option<&str>) -> Result<RitualConfig, ValidationError> {
        let config = match (name, &self.custom) {
            (Some(name), _) if name == "custom" => self.custom.clone().ok_or_else(|| {
                ValidationError::InvalidValue {
                    field: "ritual.custom".into(),
                    message: "no custom ritual configured".into(),
                }
            })?,
            (Some(name), _) => preset_or_error(name)?,
            (None, Some(custom)) => custom.clone(),
            (None, None) => preset_or_error(&self.default_preset)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn preset_or_error(name: &str) -> Result<RitualConfig, ValidationError> {
    RitualConfig::preset(name).ok_or_else(|| ValidationError::InvalidValue {
        field: "ritual.default_preset".into(),
        message: format!("unknown preset '{name}'"),
    })
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if matches!(parts.peek(), None | Some(&"")) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Unset optionals accept "none" to clear.
                    _ if value.eq_ignore_ascii_case("none") => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the default file on first run.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit file. A missing file yields (and writes) the default.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
