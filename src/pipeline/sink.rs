// src/pipeline/sink.rs

//! External collaborators of the pipeline: the build listener (log view)
//! and the artifact viewer.
//!
//! All methods are called from the runtime's event loop, one at a time.

use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::errors::LivebuildError;

/// Receives build progress and output.
///
/// Text is raw and arrives in arbitrary chunks, not lines.
pub trait BuildListener: Send {
    fn on_build_started(&mut self);
    fn on_build_output(&mut self, text: &str);
    fn on_build_error(&mut self, text: &str);
    fn on_build_finished(&mut self);

    /// Output of the previous build should be discarded.
    fn on_log_cleared(&mut self) {}

    /// A configuration problem prevented a build.
    fn on_config_error(&mut self, error: &LivebuildError);

    /// The pipeline shut down.
    fn on_closed(&mut self) {}
}

/// Reloads the artifact when it changes.
pub trait ArtifactViewer: Send {
    /// `restore_position` is false only for the very first load of an
    /// artifact.
    fn on_artifact_changed(&mut self, path: &Path, restore_position: bool);
}

/// Writes build output straight to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleListener {
    /// Print a separator when the log is cleared instead of leaving earlier
    /// output in place silently.
    pub mark_clears: bool,
}

impl BuildListener for ConsoleListener {
    fn on_build_started(&mut self) {
        info!("build started");
    }

    fn on_build_output(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn on_build_error(&mut self, text: &str) {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    }

    fn on_build_finished(&mut self) {
        info!("build finished");
    }

    fn on_log_cleared(&mut self) {
        if self.mark_clears {
            println!("----------------------------------------");
        }
    }

    fn on_config_error(&mut self, error: &LivebuildError) {
        warn!(%error, "build not started");
        eprintln!("livebuild: {error}");
    }

    fn on_closed(&mut self) {
        info!("build pipeline closed");
    }
}

/// Viewer stand-in that reports reloads on the terminal.
#[derive(Debug, Default)]
pub struct LogViewer;

impl ArtifactViewer for LogViewer {
    fn on_artifact_changed(&mut self, path: &Path, restore_position: bool) {
        info!(?path, restore_position, "artifact changed");
        println!("livebuild: artifact ready: {}", path.display());
    }
}
