// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::template::ScriptTemplate;

/// Default build script: a two-step LaTeX → DVI → PDF build.
pub const DEFAULT_SCRIPT: &str =
    "platex -halt-on-error {filename}.tex\ndvipdfmx -r 2400 -z 0 {filename}.dvi";

pub const DEFAULT_AUTO_BUILD_DELAY_SECS: f64 = 2.0;
pub const MAX_AUTO_BUILD_DELAY_SECS: f64 = 60.0;
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "pdf";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [build]
/// auto = true
/// delay = 1.5
/// script = """
/// latexmk -pdf {filename}.{fileext}
/// """
/// artifact_extension = "pdf"
/// ```
///
/// Every key is optional; missing keys take the defaults above.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub build: RawBuildSection,
}

/// `[build]` section, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBuildSection {
    /// Whether writes to the document trigger a debounced build.
    #[serde(default)]
    pub auto: bool,

    /// Quiet period in seconds between the last write and the build.
    #[serde(default = "default_delay")]
    pub delay: f64,

    /// Build script template.
    #[serde(default = "default_script")]
    pub script: String,

    /// Extension of the artifact the build produces next to the document.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
}

fn default_delay() -> f64 {
    DEFAULT_AUTO_BUILD_DELAY_SECS
}

fn default_script() -> String {
    DEFAULT_SCRIPT.to_string()
}

fn default_artifact_extension() -> String {
    DEFAULT_ARTIFACT_EXTENSION.to_string()
}

impl Default for RawBuildSection {
    fn default() -> Self {
        Self {
            auto: false,
            delay: default_delay(),
            script: default_script(),
            artifact_extension: default_artifact_extension(),
        }
    }
}

/// Validated user preferences consumed by the pipeline.
///
/// Constructed via `TryFrom<RawConfigFile>` (see `validate.rs`), which clamps
/// the delay into `[0, 60]` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub auto_build_enabled: bool,
    pub auto_build_delay: Duration,
    pub script: ScriptTemplate,
    pub artifact_extension: String,
}

impl Preferences {
    pub(crate) fn new_unchecked(
        auto_build_enabled: bool,
        auto_build_delay: Duration,
        script: ScriptTemplate,
        artifact_extension: String,
    ) -> Self {
        Self {
            auto_build_enabled,
            auto_build_delay,
            script,
            artifact_extension,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new_unchecked(
            false,
            Duration::from_secs_f64(DEFAULT_AUTO_BUILD_DELAY_SECS),
            ScriptTemplate::new(DEFAULT_SCRIPT),
            DEFAULT_ARTIFACT_EXTENSION.to_string(),
        )
    }
}

/// Values given on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct PreferenceOverrides {
    pub auto_build: Option<bool>,
    pub delay_secs: Option<f64>,
    pub script: Option<String>,
    pub artifact_extension: Option<String>,
}

impl PreferenceOverrides {
    pub fn is_empty(&self) -> bool {
        self.auto_build.is_none()
            && self.delay_secs.is_none()
            && self.script.is_none()
            && self.artifact_extension.is_none()
    }

    /// Apply the overrides to a raw section before validation.
    pub fn apply(&self, raw: &mut RawBuildSection) {
        if let Some(auto) = self.auto_build {
            raw.auto = auto;
        }
        if let Some(delay) = self.delay_secs {
            raw.delay = delay;
        }
        if let Some(ref script) = self.script {
            raw.script = script.clone();
        }
        if let Some(ref ext) = self.artifact_extension {
            raw.artifact_extension = ext.clone();
        }
    }
}
