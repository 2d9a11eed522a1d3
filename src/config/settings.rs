//! Application settings loaded from `group_buddy.toml`.
//!
//! Every field has a default, so a missing section (or an empty file) yields a
//! working configuration. `DATABASE_URL` from the environment, optionally
//! loaded from `.env`, overrides the configured store URL.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default settings file name, resolved relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "group_buddy.toml";

/// Configuration structure representing the entire settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Group lifecycle tuning
    pub groups: GroupSettings,
    /// Document store location
    pub store: StoreSettings,
}

/// Tuning for the group lifecycle controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    /// Version races to lose before a write fails with `Conflict`
    pub max_write_attempts: u32,
    /// Emit a capacity warning once this few slots (or fewer) remain
    pub capacity_warning_remaining: u32,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            max_write_attempts: 5,
            capacity_warning_remaining: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// `SeaORM` connection URL
    pub database_url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: super::database::DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Self = toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse settings: {e}"),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.groups.max_write_attempts == 0 {
            return Err(Error::Config {
                message: "groups.max_write_attempts must be at least 1".to_string(),
            });
        }
        if self.store.database_url.trim().is_empty() {
            return Err(Error::Config {
                message: "store.database_url cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Applies environment overrides (`DATABASE_URL`).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.store.database_url =
            super::database::get_database_url(Some(self.store.database_url.as_str()));
        self
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading settings from {}", path_ref.display());
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read settings file {}: {e}", path_ref.display()),
    })?;
    Settings::from_toml(&contents)
}

/// Loads `.env` (if present), then `group_buddy.toml` if it exists, then
/// environment overrides. A missing settings file means defaults.
pub fn load_default_settings() -> Result<Settings> {
    if dotenvy::dotenv().is_ok() {
        tracing::debug!("Loaded .env file");
    }

    let settings = if Path::new(DEFAULT_SETTINGS_PATH).exists() {
        load_settings(DEFAULT_SETTINGS_PATH)?
    } else {
        tracing::info!("No {DEFAULT_SETTINGS_PATH} found, using defaults");
        Settings::default()
    };
    Ok(settings.with_env_overrides())
}
