// src/config/mod.rs

//! Configuration loading and validation for livebuild.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file and expose it as a `PreferenceSource` (`loader.rs`).
//! - Validate and clamp values (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_FILE_NAME, FilePreferences, PreferenceSource, StaticPreferences,
    default_config_path, load_from_path, load_preferences,
};
pub use model::{PreferenceOverrides, Preferences, RawBuildSection, RawConfigFile};
