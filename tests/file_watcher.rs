// tests/file_watcher.rs

use std::error::Error;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use livebuild::errors::LivebuildError;
use livebuild::types::ChangeKind;
use livebuild::watch::FileWatcher;
use livebuild_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for a change containing `wanted`, skipping unrelated ones.
fn expect_kind(rx: &mpsc::Receiver<ChangeKind>, wanted: ChangeKind) -> ChangeKind {
    loop {
        let kind = rx
            .recv_timeout(EVENT_TIMEOUT)
            .unwrap_or_else(|_| panic!("no {wanted:?} event"));
        if kind.contains(wanted) {
            return kind;
        }
    }
}

#[test]
fn opening_a_missing_path_fails_with_path_unavailable() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let err = FileWatcher::open(dir.path().join("missing.tex"), |_| {}).unwrap_err();
    assert!(matches!(err, LivebuildError::PathUnavailable { .. }));
}

#[test]
fn write_to_watched_file_is_reported() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("paper.tex");
    std::fs::write(&file, "a")?;

    let (tx, rx) = mpsc::channel();
    let watcher = FileWatcher::open(&file, move |kind| {
        let _ = tx.send(kind);
    })?;
    assert!(watcher.is_open());

    std::fs::write(&file, "ab")?;
    expect_kind(&rx, ChangeKind::WRITTEN);
    Ok(())
}

#[test]
fn removing_watched_file_is_reported() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("paper.pdf");
    std::fs::write(&file, "%PDF")?;

    let (tx, rx) = mpsc::channel();
    let _watcher = FileWatcher::open(&file, move |kind| {
        let _ = tx.send(kind);
    })?;

    std::fs::remove_file(&file)?;
    expect_kind(&rx, ChangeKind::REMOVED);
    Ok(())
}

#[test]
fn new_entry_in_watched_directory_is_reported() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let (tx, rx) = mpsc::channel();
    let _watcher = FileWatcher::open(dir.path(), move |kind| {
        let _ = tx.send(kind);
    })?;

    std::fs::write(dir.path().join("paper.pdf"), "%PDF")?;
    expect_kind(&rx, ChangeKind::WRITTEN);
    Ok(())
}

#[test]
fn no_events_are_delivered_after_close() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("paper.tex");
    std::fs::write(&file, "a")?;

    let (tx, rx) = mpsc::channel();
    let watcher = FileWatcher::open(&file, move |kind| {
        let _ = tx.send(kind);
    })?;

    assert!(watcher.close());
    assert!(!watcher.is_open());

    std::fs::write(&file, "changed")?;
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    Ok(())
}

#[test]
fn concurrent_close_releases_exactly_once() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("paper.tex");
    std::fs::write(&file, "a")?;

    for _ in 0..20 {
        let watcher = Arc::new(FileWatcher::open(&file, |_| {})?);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let watcher = Arc::clone(&watcher);
                std::thread::spawn(move || watcher.close())
            })
            .collect();

        let released = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|released| *released)
            .count();
        assert_eq!(released, 1);

        // Dropping the last handle does not release again.
        assert!(!watcher.close());
    }
    Ok(())
}
