/// Database configuration and connection management
pub mod database;

/// Settings loading from group_buddy.toml and the environment
pub mod settings;

pub use settings::{GroupSettings, Settings, StoreSettings, load_default_settings, load_settings};
