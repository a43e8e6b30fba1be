// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::errors::{LivebuildError, Result};
use crate::types::ChangeKind;
use crate::watch::classify::classify;

/// A live subscription to change events on exactly one path.
///
/// `notify` runs its wait loop on its own thread and the handler given to
/// [`FileWatcher::open`] is invoked from there; consumers that need to act on
/// their own event loop forward the [`ChangeKind`] into a channel.
///
/// The OS watch is released exactly once, by the first of [`close`] or drop.
///
/// [`close`]: FileWatcher::close
pub struct FileWatcher {
    path: PathBuf,
    watched: PathBuf,
    inner: Mutex<Option<RecommendedWatcher>>,
    /// Cleared on close so events already in flight on the notify thread are
    /// not delivered after the owner let go of the handle.
    active: Arc<AtomicBool>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl FileWatcher {
    /// Start watching `path`, calling `handler` with the classified change
    /// kinds of every event. Events that classify to an empty set are dropped.
    ///
    /// Fails with [`LivebuildError::PathUnavailable`] if `path` does not exist
    /// or the OS watch cannot be installed.
    pub fn open<F>(path: impl Into<PathBuf>, mut handler: F) -> Result<Self>
    where
        F: FnMut(ChangeKind) + Send + 'static,
    {
        let path = path.into();
        let watched = path
            .canonicalize()
            .map_err(|err| LivebuildError::path_unavailable(&path, err))?;
        let is_dir = watched.is_dir();

        let active = Arc::new(AtomicBool::new(true));

        // Closure called synchronously by notify whenever an event arrives.
        let mut watcher = RecommendedWatcher::new(
            {
                let active = Arc::clone(&active);
                let target = watched.clone();
                move |res: notify::Result<Event>| match res {
                    Ok(event) => {
                        if !active.load(Ordering::Acquire) {
                            return;
                        }
                        let kind = classify(&event, &target, is_dir);
                        if !kind.is_empty() {
                            handler(kind);
                        }
                    }
                    Err(err) => {
                        warn!(path = ?target, error = %err, "file watch error");
                    }
                }
            },
            Config::default(),
        )
        .map_err(|err| LivebuildError::path_unavailable(&path, err))?;

        watcher
            .watch(&watched, RecursiveMode::NonRecursive)
            .map_err(|err| LivebuildError::path_unavailable(&path, err))?;

        info!(path = ?watched, is_dir, "watching path");

        Ok(Self {
            path,
            watched,
            inner: Mutex::new(Some(watcher)),
            active,
        })
    }

    /// The path this handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop watching and release the OS watch.
    ///
    /// Returns `true` only for the call that actually released it; later (or
    /// concurrent) calls return `false`.
    pub fn close(&self) -> bool {
        self.active.store(false, Ordering::Release);

        let taken = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match taken {
            Some(mut watcher) => {
                if let Err(err) = watcher.unwatch(&self.watched) {
                    // The path may already be gone; dropping the watcher
                    // releases the descriptor either way.
                    debug!(path = ?self.watched, error = %err, "unwatch failed");
                }
                drop(watcher);
                debug!(path = ?self.watched, "watch released");
                true
            }
            None => false,
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.close();
    }
}
