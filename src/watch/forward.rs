// src/watch/forward.rs

//! Bridge from a watcher thread into an async event channel.

use tokio::sync::mpsc;
use tracing::trace;

use crate::types::ChangeKind;

/// Build a [`FileWatcher`](super::FileWatcher) handler that hands each change
/// over to the owner's event loop.
///
/// The handler never blocks the notify thread: kinds go through an unbounded
/// hop and a Tokio task turns them into events with `make_event` and sends
/// them on `tx`. The task ends once the handler (and so the watcher) is
/// dropped.
///
/// Must be called from within a Tokio runtime.
pub fn forward_to<E, F>(tx: mpsc::Sender<E>, mut make_event: F) -> impl FnMut(ChangeKind) + Send + 'static
where
    E: Send + 'static,
    F: FnMut(ChangeKind) -> E + Send + 'static,
{
    let (hop_tx, mut hop_rx) = mpsc::unbounded_channel::<ChangeKind>();

    tokio::spawn(async move {
        while let Some(kind) = hop_rx.recv().await {
            if tx.send(make_event(kind)).await.is_err() {
                trace!("event loop gone; dropping watch events");
                break;
            }
        }
    });

    move |kind| {
        // Receiver only goes away together with the event loop.
        let _ = hop_tx.send(kind);
    }
}
