// src/types.rs

//! Small value types shared between the watcher, executor and pipeline layers.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of change kinds reported for one file-system event on a watched path.
///
/// Mirrors the vnode flags a kernel event queue reports: a single event may
/// carry several kinds at once (e.g. a write that also grew the file).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeKind(u8);

impl ChangeKind {
    pub const REMOVED: ChangeKind = ChangeKind(1 << 0);
    pub const WRITTEN: ChangeKind = ChangeKind(1 << 1);
    pub const EXTENDED: ChangeKind = ChangeKind(1 << 2);
    pub const LINK_CHANGED: ChangeKind = ChangeKind(1 << 3);
    pub const RENAMED: ChangeKind = ChangeKind(1 << 4);
    pub const REVOKED: ChangeKind = ChangeKind(1 << 5);

    const NAMES: [(ChangeKind, &'static str); 6] = [
        (ChangeKind::REMOVED, "removed"),
        (ChangeKind::WRITTEN, "written"),
        (ChangeKind::EXTENDED, "extended"),
        (ChangeKind::LINK_CHANGED, "link-changed"),
        (ChangeKind::RENAMED, "renamed"),
        (ChangeKind::REVOKED, "revoked"),
    ];

    pub const fn empty() -> Self {
        ChangeKind(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is also set in `self`.
    pub const fn contains(self, other: ChangeKind) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if `self` and `other` share at least one flag.
    pub const fn intersects(self, other: ChangeKind) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ChangeKind {
    type Output = ChangeKind;

    fn bitor(self, rhs: ChangeKind) -> ChangeKind {
        ChangeKind(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeKind {
    fn bitor_assign(&mut self, rhs: ChangeKind) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ChangeKind({})", names.join("|"))
    }
}

/// Which output stream of the build process a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Identity of one build attempt.
///
/// Ids are handed out in increasing order by the pipeline core, so the id of
/// the current job doubles as the generation used to discard late events from
/// superseded jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Subscription generation for one logical watch target.
///
/// Bumped every time the target is reassigned or torn down; events tagged with
/// an older epoch are ignored.
pub type Epoch = u64;
