use std::time::Duration;

use livebuild::config::{Preferences, StaticPreferences};
use livebuild::template::ScriptTemplate;

/// Builder for `Preferences` to simplify test setup.
///
/// Starts from the defaults, except that auto-build is on.
pub struct PreferencesBuilder {
    prefs: Preferences,
}

impl PreferencesBuilder {
    pub fn new() -> Self {
        Self {
            prefs: Preferences {
                auto_build_enabled: true,
                ..Preferences::default()
            },
        }
    }

    pub fn auto_build(mut self, enabled: bool) -> Self {
        self.prefs.auto_build_enabled = enabled;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.prefs.auto_build_delay = delay;
        self
    }

    pub fn script(mut self, script: &str) -> Self {
        self.prefs.script = ScriptTemplate::new(script);
        self
    }

    pub fn artifact_extension(mut self, ext: &str) -> Self {
        self.prefs.artifact_extension = ext.to_string();
        self
    }

    pub fn build(self) -> Preferences {
        self.prefs
    }

    pub fn into_source(self) -> StaticPreferences {
        StaticPreferences(self.prefs)
    }
}

impl Default for PreferencesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
