// src/artifact/mod.rs

//! Artifact reload notification.
//!
//! The build's output file (the artifact) may not exist when watching starts,
//! so it is tracked through two watches: its containing directory, to see it
//! appear or disappear, and the file itself once it exists, to see it being
//! rewritten. Both paths converge on a single debounced reload.
//!
//! - [`state`] holds the pure existence/reload decisions.
//! - [`watcher`] owns the watches, the reload timer and the viewer.

use std::time::Duration;

use crate::debounce::DebounceToken;
use crate::types::{ChangeKind, Epoch};

pub mod state;
pub mod watcher;

pub use state::{ArtifactCommand, ArtifactState};
pub use watcher::ArtifactWatcher;

/// Quiet period before a changed artifact is reloaded.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Events for the artifact side of the pipeline.
///
/// Watch events carry the epoch they were subscribed with and whether the
/// artifact existed when the event was forwarded.
#[derive(Debug, Clone)]
pub enum ArtifactEvent {
    DirectoryChanged { epoch: Epoch, exists: bool },
    FileChanged { epoch: Epoch, kind: ChangeKind, exists: bool },
    ReloadFired(DebounceToken),
    /// Reload now, e.g. on user request.
    ReloadRequested,
}
