// src/config/validate.rs

use std::time::Duration;

use tracing::warn;

use crate::config::model::{MAX_AUTO_BUILD_DELAY_SECS, Preferences, RawBuildSection, RawConfigFile};
use crate::errors::{LivebuildError, Result};
use crate::template::ScriptTemplate;

impl TryFrom<RawConfigFile> for Preferences {
    type Error = crate::errors::LivebuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let build = raw.build;
        let delay = clamp_delay(build.delay)?;
        let extension = validate_artifact_extension(&build)?;

        // An empty script is *not* rejected here: it is a runtime condition
        // reported on each build attempt, so the user can fix the file while
        // the watcher keeps running.
        Ok(Preferences::new_unchecked(
            build.auto,
            delay,
            ScriptTemplate::new(build.script),
            extension,
        ))
    }
}

/// Clamp the auto-build delay into `[0, 60]` seconds.
///
/// Non-finite values cannot be clamped meaningfully and are rejected.
pub fn clamp_delay(secs: f64) -> Result<Duration> {
    if !secs.is_finite() {
        return Err(LivebuildError::ConfigError(format!(
            "[build].delay must be a finite number of seconds (got {secs})"
        )));
    }

    let clamped = secs.clamp(0.0, MAX_AUTO_BUILD_DELAY_SECS);
    if clamped != secs {
        warn!(
            requested = secs,
            clamped, "auto-build delay out of range; clamping"
        );
    }

    Ok(Duration::from_secs_f64(clamped))
}

fn validate_artifact_extension(build: &RawBuildSection) -> Result<String> {
    let ext = build.artifact_extension.trim().trim_start_matches('.');

    if ext.is_empty() {
        return Err(LivebuildError::ConfigError(
            "[build].artifact_extension must not be empty".to_string(),
        ));
    }
    if ext.contains(['/', '\\']) {
        return Err(LivebuildError::ConfigError(format!(
            "[build].artifact_extension must be a bare extension (got {:?})",
            build.artifact_extension
        )));
    }

    Ok(ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_clamped_into_range() {
        assert_eq!(clamp_delay(-3.0).unwrap(), Duration::ZERO);
        assert_eq!(clamp_delay(2.5).unwrap(), Duration::from_millis(2500));
        assert_eq!(clamp_delay(600.0).unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn nan_delay_is_rejected() {
        assert!(matches!(
            clamp_delay(f64::NAN),
            Err(LivebuildError::ConfigError(_))
        ));
    }

    #[test]
    fn extension_leading_dot_is_stripped() {
        let mut raw = RawConfigFile::default();
        raw.build.artifact_extension = ".dvi".into();
        let prefs = Preferences::try_from(raw).unwrap();
        assert_eq!(prefs.artifact_extension, "dvi");
    }

    #[test]
    fn extension_with_separator_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.build.artifact_extension = "out/pdf".into();
        assert!(Preferences::try_from(raw).is_err());
    }

    #[test]
    fn empty_script_is_accepted_at_load_time() {
        let mut raw = RawConfigFile::default();
        raw.build.script = String::new();
        let prefs = Preferences::try_from(raw).unwrap();
        assert_eq!(prefs.script.as_str(), "");
    }
}
