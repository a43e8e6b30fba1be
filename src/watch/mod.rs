// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform, non-recursive watch on one path (`notify`).
//! - Classifying raw `notify` events into [`ChangeKind`](crate::types::ChangeKind)
//!   flags relative to that path.
//! - Handing changes from the notify thread over to an async event loop.
//!
//! It does **not** know about builds or artifacts; owners decide what a
//! change means.

pub mod classify;
pub mod forward;
pub mod watcher;

pub use classify::classify;
pub use forward::forward_to;
pub use watcher::FileWatcher;
