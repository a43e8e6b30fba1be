// src/watch/classify.rs

//! Translate `notify` events into [`ChangeKind`] flags for one watched path.

use std::path::Path;

use notify::event::{AccessKind, AccessMode, DataChange, MetadataKind, ModifyKind};
use notify::{Event, EventKind};

use crate::types::ChangeKind;

/// Classify `event` relative to the watched `target`.
///
/// - Events on `target` itself map to the vnode-style flags.
/// - If `target` is a directory, creations, removals and renames of its
///   direct children are reported as [`ChangeKind::WRITTEN`] on the directory
///   (its entry list changed).
/// - Everything else yields an empty set.
pub fn classify(event: &Event, target: &Path, target_is_dir: bool) -> ChangeKind {
    let mut kind = ChangeKind::empty();

    for path in &event.paths {
        if path == target {
            kind |= classify_self(&event.kind);
        } else if target_is_dir && path.parent() == Some(target) {
            kind |= classify_child(&event.kind);
        }
    }

    kind
}

fn classify_self(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Remove(_) => ChangeKind::REMOVED,
        EventKind::Create(_) => ChangeKind::WRITTEN,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::RENAMED,
        EventKind::Modify(ModifyKind::Data(DataChange::Size)) => {
            ChangeKind::WRITTEN | ChangeKind::EXTENDED
        }
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            ChangeKind::WRITTEN
        }
        EventKind::Modify(ModifyKind::Metadata(meta)) => match meta {
            MetadataKind::Permissions | MetadataKind::Ownership => ChangeKind::REVOKED,
            MetadataKind::AccessTime | MetadataKind::WriteTime => ChangeKind::empty(),
            _ => ChangeKind::LINK_CHANGED,
        },
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::WRITTEN,
        _ => ChangeKind::empty(),
    }
}

fn classify_child(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
            ChangeKind::WRITTEN
        }
        _ => ChangeKind::empty(),
    }
}
