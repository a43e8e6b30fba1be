use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use livebuild::errors::LivebuildError;
use livebuild::pipeline::{ArtifactViewer, BuildListener};

/// One call made on a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerCall {
    Started,
    Output(String),
    Error(String),
    Finished,
    Cleared,
    ConfigError(String),
    Closed,
}

/// Build listener that records every call for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    calls: Arc<Mutex<Vec<ListenerCall>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ListenerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Concatenated stdout text since the last clear.
    pub fn output_since_clear(&self) -> String {
        let calls = self.calls();
        let start = calls
            .iter()
            .rposition(|c| *c == ListenerCall::Cleared)
            .map_or(0, |i| i + 1);
        calls[start..]
            .iter()
            .filter_map(|c| match c {
                ListenerCall::Output(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &ListenerCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn push(&self, call: ListenerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BuildListener for RecordingListener {
    fn on_build_started(&mut self) {
        self.push(ListenerCall::Started);
    }

    fn on_build_output(&mut self, text: &str) {
        self.push(ListenerCall::Output(text.to_string()));
    }

    fn on_build_error(&mut self, text: &str) {
        self.push(ListenerCall::Error(text.to_string()));
    }

    fn on_build_finished(&mut self) {
        self.push(ListenerCall::Finished);
    }

    fn on_log_cleared(&mut self) {
        self.push(ListenerCall::Cleared);
    }

    fn on_config_error(&mut self, error: &LivebuildError) {
        self.push(ListenerCall::ConfigError(error.to_string()));
    }

    fn on_closed(&mut self) {
        self.push(ListenerCall::Closed);
    }
}

/// Artifact viewer that records every reload.
#[derive(Debug, Clone, Default)]
pub struct RecordingViewer {
    reloads: Arc<Mutex<Vec<(PathBuf, bool)>>>,
}

impl RecordingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reloads(&self) -> Vec<(PathBuf, bool)> {
        self.reloads.lock().unwrap().clone()
    }
}

impl ArtifactViewer for RecordingViewer {
    fn on_artifact_changed(&mut self, path: &Path, restore_position: bool) {
        self.reloads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), restore_position));
    }
}
