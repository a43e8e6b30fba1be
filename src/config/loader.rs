// src/config/loader.rs

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::model::{PreferenceOverrides, Preferences, RawConfigFile};
use crate::errors::Result;
use crate::fs::FileSystem;

/// File name looked up next to the document when no `--config` is given.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "livebuild.toml";

/// Load a configuration file and return the raw, unvalidated `RawConfigFile`.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs.read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load, apply CLI overrides and validate.
///
/// A missing file is not an error: defaults (plus overrides) are used.
pub fn load_preferences(
    fs: &dyn FileSystem,
    path: Option<&Path>,
    overrides: &PreferenceOverrides,
) -> Result<Preferences> {
    let mut raw = match path {
        Some(path) if fs.is_file(path) => load_from_path(fs, path)?,
        Some(path) => {
            debug!(?path, "no config file; using defaults");
            RawConfigFile::default()
        }
        None => RawConfigFile::default(),
    };

    overrides.apply(&mut raw.build);
    Preferences::try_from(raw)
}

/// The config file consulted for `document` when none is given explicitly.
pub fn default_config_path(document: &Path) -> PathBuf {
    match document.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(DEFAULT_CONFIG_FILE_NAME),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE_NAME),
    }
}

/// External preference store.
///
/// The pipeline asks for a fresh snapshot once per relevant call (each write
/// event and each build), instead of holding on to a process-wide singleton.
pub trait PreferenceSource: Send + Sync + Debug {
    fn load(&self) -> Preferences;
}

/// A fixed set of preferences.
#[derive(Debug, Clone, Default)]
pub struct StaticPreferences(pub Preferences);

impl PreferenceSource for StaticPreferences {
    fn load(&self) -> Preferences {
        self.0.clone()
    }
}

/// Preferences re-read from a TOML file on every call, so edits to the file
/// take effect on the next build without restarting.
///
/// If the file becomes unreadable or invalid, the last good snapshot is kept.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    overrides: PreferenceOverrides,
    last_good: std::sync::Mutex<Preferences>,
}

impl FilePreferences {
    /// Load the file once up front; errors here are reported to the caller.
    pub fn open(
        path: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        overrides: PreferenceOverrides,
    ) -> Result<Self> {
        let path = path.into();
        let initial = load_preferences(fs.as_ref(), Some(&path), &overrides)?;
        Ok(Self {
            path,
            fs,
            overrides,
            last_good: std::sync::Mutex::new(initial),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceSource for FilePreferences {
    fn load(&self) -> Preferences {
        let mut last_good = self
            .last_good
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match load_preferences(self.fs.as_ref(), Some(&self.path), &self.overrides) {
            Ok(prefs) => {
                *last_good = prefs.clone();
                prefs
            }
            Err(err) => {
                warn!(
                    path = ?self.path,
                    error = %err,
                    "failed to reload preferences; keeping previous values"
                );
                last_good.clone()
            }
        }
    }
}
