// src/debounce.rs

//! Single-shot, restartable delay used to coalesce bursts of file events.
//!
//! A [`DebounceTimer`] fires by *sending an event* into the owner's channel,
//! so the callback side always runs on the owner's event loop, never on the
//! timer task. Because a fire may already be sitting in the channel when the
//! timer is rescheduled or cancelled, every fire carries a [`DebounceToken`]
//! and the owner must call [`DebounceTimer::accept`] before acting on it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Identifies one `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceToken(u64);

impl DebounceToken {
    #[cfg(test)]
    pub(crate) fn for_tests(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug)]
struct PendingFire {
    token: DebounceToken,
    handle: JoinHandle<()>,
}

/// At most one pending fire per instance; scheduling again replaces it.
#[derive(Debug)]
pub struct DebounceTimer {
    name: &'static str,
    generation: u64,
    pending: Option<PendingFire>,
}

impl DebounceTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: 0,
            pending: None,
        }
    }

    /// Cancel any pending fire, then arm a new one: after `delay`, the event
    /// built by `make_event` is sent on `tx`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<E, F>(
        &mut self,
        delay: Duration,
        tx: mpsc::Sender<E>,
        make_event: F,
    ) -> DebounceToken
    where
        E: Send + 'static,
        F: FnOnce(DebounceToken) -> E + Send + 'static,
    {
        self.abort_pending();

        self.generation += 1;
        let token = DebounceToken(self.generation);
        let name = self.name;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(timer = name, ?token, "debounce timer elapsed");
            // The owner may be gone already; nothing to do then.
            let _ = tx.send(make_event(token)).await;
        });

        trace!(timer = name, ?token, ?delay, "debounce timer armed");
        self.pending = Some(PendingFire { token, handle });
        token
    }

    /// Invalidate the pending fire, if any, without running it.
    ///
    /// Returns `true` if something was pending.
    pub fn cancel(&mut self) -> bool {
        let had_pending = self.pending.is_some();
        self.abort_pending();
        had_pending
    }

    /// Claim a fire delivered through the channel.
    ///
    /// Returns `true` exactly once for the most recent `schedule` call, and
    /// `false` for fires that were superseded or cancelled.
    pub fn accept(&mut self, token: DebounceToken) -> bool {
        match self.pending {
            Some(ref pending) if pending.token == token => {
                self.pending = None;
                true
            }
            _ => {
                trace!(timer = self.name, ?token, "ignoring stale debounce fire");
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
