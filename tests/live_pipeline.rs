// tests/live_pipeline.rs

//! End-to-end runs with real file watches and real build processes.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use livebuild::config::StaticPreferences;
use livebuild::errors::Result as LivebuildResult;
use livebuild::exec::RealBuildBackend;
use livebuild::fs::RealFileSystem;
use livebuild::pipeline::{
    BuildCore, BuildEvent, Runtime, RuntimeEvent, RuntimeOptions, RuntimeSummary,
};
use livebuild_test_utils::builders::PreferencesBuilder;
use livebuild_test_utils::recording::{ListenerCall, RecordingListener, RecordingViewer};
use livebuild_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

struct Live {
    tx: mpsc::Sender<RuntimeEvent>,
    listener: RecordingListener,
    viewer: RecordingViewer,
    task: JoinHandle<LivebuildResult<RuntimeSummary>>,
    document: PathBuf,
    dir: tempfile::TempDir,
}

impl Live {
    /// Start a runtime tracking `paper.tex` in a fresh directory. `setup`
    /// runs before the document is assigned.
    async fn start(prefs: StaticPreferences, setup: impl FnOnce(&std::path::Path)) -> Self {
        init_tracing();

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let document = root.join("paper.tex");
        std::fs::write(&document, "\\documentclass{article}\n").unwrap();
        setup(&root);

        let (tx, rx) = mpsc::channel(256);
        let listener = RecordingListener::new();
        let viewer = RecordingViewer::new();

        let runtime = Runtime::new(
            BuildCore::new(RuntimeOptions::default()),
            (tx.clone(), rx),
            RealBuildBackend::new(tx.clone()),
            Arc::new(prefs),
            Arc::new(RealFileSystem),
            Box::new(listener.clone()),
            Box::new(viewer.clone()),
        );
        let task = tokio::spawn(runtime.run());

        tx.send(BuildEvent::SetDocument(Some(document.clone())).into())
            .await
            .unwrap();
        // Give the watches time to be installed.
        tokio::time::sleep(Duration::from_millis(200)).await;

        Self {
            tx,
            listener,
            viewer,
            task,
            document,
            dir,
        }
    }

    async fn stop(self) -> LivebuildResult<RuntimeSummary> {
        self.tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
        let summary = self.task.await.unwrap();
        drop(self.dir);
        summary
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn single_write_runs_one_build_in_document_directory() -> TestResult {
    let prefs = PreferencesBuilder::new()
        .delay(Duration::from_millis(300))
        .script("echo \"built {filename}.{fileext} in $(pwd)\"")
        .into_source();
    let live = Live::start(prefs, |_| {}).await;

    std::fs::write(&live.document, "\\documentclass{article}\n% edit\n")?;

    let listener = live.listener.clone();
    wait_for(|| listener.count(&ListenerCall::Finished) == 1).await;
    // No second build from the same write.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let dir = live.document.parent().unwrap().display().to_string();
    assert_eq!(listener.count(&ListenerCall::Started), 1);
    assert!(
        listener
            .output_since_clear()
            .contains(&format!("built paper.tex in {dir}")),
        "output: {:?}",
        listener.output_since_clear()
    );

    let summary = live.stop().await?;
    assert_eq!(summary.jobs_started, 1);
    assert!(summary.last_build_succeeded());
    Ok(())
}

#[tokio::test]
async fn cancelled_build_output_is_replaced_by_new_build() -> TestResult {
    let prefs = PreferencesBuilder::new()
        .auto_build(false)
        .script("if [ -e marker ]; then echo second; else touch marker; echo first; sleep 30; fi")
        .into_source();
    let live = Live::start(prefs, |_| {}).await;
    let listener = live.listener.clone();

    live.tx.send(BuildEvent::RunNow.into()).await?;
    wait_for(|| listener.output_since_clear().contains("first")).await;

    live.tx.send(BuildEvent::RunNow.into()).await?;
    wait_for(|| listener.count(&ListenerCall::Finished) == 1).await;

    let output = listener.output_since_clear();
    assert!(output.contains("second"), "output: {output:?}");
    assert!(!output.contains("first"), "output: {output:?}");
    assert_eq!(listener.count(&ListenerCall::Started), 2);

    live.stop().await?;
    Ok(())
}

#[tokio::test]
async fn artifact_created_by_build_is_reloaded_keeping_position() -> TestResult {
    let prefs = PreferencesBuilder::new()
        .auto_build(false)
        .script("printf '%%PDF-1.5' > {filename}.pdf")
        .into_source();
    let live = Live::start(prefs, |_| {}).await;
    let artifact = live.document.with_extension("pdf");
    assert!(live.viewer.reloads().is_empty());

    live.tx.send(BuildEvent::RunNow.into()).await?;

    let viewer = live.viewer.clone();
    wait_for(|| !viewer.reloads().is_empty()).await;
    assert!(artifact.is_file());
    assert_eq!(viewer.reloads()[0], (artifact, true));

    live.stop().await?;
    Ok(())
}

#[tokio::test]
async fn existing_artifact_is_loaded_without_restoring_position() -> TestResult {
    let prefs = PreferencesBuilder::new().auto_build(false).into_source();
    let live = Live::start(prefs, |root| {
        std::fs::write(root.join("paper.pdf"), "%PDF-1.5").unwrap();
    })
    .await;

    assert_eq!(
        live.viewer.reloads(),
        vec![(live.document.with_extension("pdf"), false)]
    );

    // Manual reload keeps the position.
    live.tx
        .send(livebuild::artifact::ArtifactEvent::ReloadRequested.into())
        .await?;
    let viewer = live.viewer.clone();
    wait_for(|| viewer.reloads().len() == 2).await;
    assert!(viewer.reloads()[1].1);

    live.stop().await?;
    Ok(())
}
