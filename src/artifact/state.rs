// src/artifact/state.rs

//! Pure artifact tracking state.
//!
//! Like the build core, this performs no IO: every method returns the
//! commands the owning shell should carry out.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::{ChangeKind, Epoch};

/// Action requested from the artifact shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactCommand {
    WatchDirectory { dir: PathBuf, epoch: Epoch },
    /// (Re)open the file watch, replacing any existing one.
    WatchFile { path: PathBuf, epoch: Epoch },
    UnwatchFile,
    UnwatchAll,
    ScheduleReload,
    CancelReload,
    Reload { path: PathBuf, restore_position: bool },
}

#[derive(Debug, Default)]
pub struct ArtifactState {
    path: Option<PathBuf>,
    epoch: Epoch,
    exists: bool,
}

impl ArtifactState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Retarget to `path` (or stop tracking with `None`). `exists` is whether
    /// the new artifact is already on disk.
    ///
    /// An artifact that already exists is loaded right away without
    /// restoring the viewer position.
    pub fn assign(&mut self, path: Option<PathBuf>, exists: bool) -> Vec<ArtifactCommand> {
        self.epoch += 1;
        let mut commands = vec![ArtifactCommand::CancelReload, ArtifactCommand::UnwatchAll];

        self.path = path;
        self.exists = false;

        let Some(path) = self.path.clone() else {
            return commands;
        };

        if let Some(dir) = path.parent() {
            commands.push(ArtifactCommand::WatchDirectory {
                dir: dir.to_path_buf(),
                epoch: self.epoch,
            });
        }

        if exists {
            self.exists = true;
            commands.push(ArtifactCommand::WatchFile {
                path: path.clone(),
                epoch: self.epoch,
            });
            commands.push(ArtifactCommand::Reload {
                path,
                restore_position: false,
            });
        }

        commands
    }

    /// Something in the artifact's directory changed.
    pub fn directory_changed(&mut self, epoch: Epoch, exists: bool) -> Vec<ArtifactCommand> {
        if !self.is_current(epoch) {
            return Vec::new();
        }
        self.existence_changed(exists)
    }

    /// The artifact file watch reported `kind`.
    pub fn file_changed(&mut self, epoch: Epoch, kind: ChangeKind, exists: bool) -> Vec<ArtifactCommand> {
        if !self.is_current(epoch) {
            return Vec::new();
        }

        if kind.intersects(ChangeKind::REMOVED | ChangeKind::RENAMED) {
            // Replaced by a new file under the same name: the old watch
            // follows the old file, so watch again.
            if exists {
                return self.rewatch_and_schedule();
            }
            return self.existence_changed(false);
        }

        if kind.contains(ChangeKind::WRITTEN) && self.exists {
            return vec![ArtifactCommand::ScheduleReload];
        }

        Vec::new()
    }

    /// The file watch could not be opened; wait for the directory to report
    /// the artifact again.
    pub fn file_unavailable(&mut self, epoch: Epoch) -> Vec<ArtifactCommand> {
        if !self.is_current(epoch) {
            return Vec::new();
        }
        self.exists = false;
        vec![ArtifactCommand::CancelReload]
    }

    /// The reload debounce elapsed.
    pub fn reload_fired(&self) -> Vec<ArtifactCommand> {
        match (&self.path, self.exists) {
            (Some(path), true) => vec![ArtifactCommand::Reload {
                path: path.clone(),
                restore_position: true,
            }],
            _ => Vec::new(),
        }
    }

    /// Reload immediately, dropping any pending debounced reload.
    pub fn reload_requested(&self) -> Vec<ArtifactCommand> {
        match (&self.path, self.exists) {
            (Some(path), true) => vec![
                ArtifactCommand::CancelReload,
                ArtifactCommand::Reload {
                    path: path.clone(),
                    restore_position: true,
                },
            ],
            _ => {
                debug!(path = ?self.path, "no artifact to reload");
                Vec::new()
            }
        }
    }

    fn existence_changed(&mut self, exists: bool) -> Vec<ArtifactCommand> {
        match (self.exists, exists) {
            (false, true) => self.rewatch_and_schedule(),
            (true, false) => {
                self.exists = false;
                vec![ArtifactCommand::UnwatchFile, ArtifactCommand::CancelReload]
            }
            _ => Vec::new(),
        }
    }

    fn rewatch_and_schedule(&mut self) -> Vec<ArtifactCommand> {
        let Some(path) = self.path.clone() else {
            return Vec::new();
        };
        self.exists = true;
        vec![
            ArtifactCommand::WatchFile {
                path,
                epoch: self.epoch,
            },
            ArtifactCommand::ScheduleReload,
        ]
    }

    fn is_current(&self, epoch: Epoch) -> bool {
        if epoch != self.epoch || self.path.is_none() {
            debug!(epoch, current = self.epoch, "ignoring stale artifact event");
            return false;
        }
        true
    }
}
