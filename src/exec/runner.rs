// src/exec/runner.rs

//! Build process runner.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::LivebuildError;
use crate::exec::decode::ChunkDecoder;
use crate::exec::job::{BuildJob, ExitInfo, JobHandle, JobReport, JobState};
use crate::pipeline::{BuildEvent, RuntimeEvent};
use crate::types::{JobId, OutputStream};

/// Shell used to run build scripts, as a login shell (`-l -c <script>`).
pub const SHELL: &str = "bash";

/// How long to keep reading output after the process exited. A background
/// grandchild can hold the pipes open indefinitely; past this point the
/// readers are detached.
pub const STREAM_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const READ_CHUNK_SIZE: usize = 8 * 1024;

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Run one build job to completion and return its report.
///
/// - Output chunks are forwarded to `runtime_tx` as [`BuildEvent::Output`]
///   while the process runs.
/// - Cancelling through `handle` sends SIGTERM to the process group; this
///   function still waits for the exit and returns a report.
/// - A spawn failure is returned as [`JobState::SpawnFailed`], never as a
///   panic or an error.
pub async fn run_job(
    job: BuildJob,
    handle: JobHandle,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> JobReport {
    if handle.is_cancelled() {
        debug!(job = %job.id, "job cancelled before it started");
        handle.set_state(JobState::Cancelled);
        return JobReport::cancelled_before_start(job.id);
    }

    info!(
        job = %job.id,
        dir = ?job.working_dir,
        script = %job.script,
        "starting build process"
    );

    let mut child = match shell_command(&job).spawn() {
        Ok(child) => child,
        Err(err) => {
            let err = LivebuildError::ProcessSpawn(err);
            error!(job = %job.id, error = %err, "build process could not be started");
            let reason = err.to_string();
            handle.set_state(JobState::SpawnFailed(reason.clone()));
            return JobReport::spawn_failed(job.id, reason);
        }
    };
    handle.set_state(JobState::Running);

    let stdout_buf: SharedBuffer = Arc::default();
    let stderr_buf: SharedBuffer = Arc::default();

    let readers = [
        spawn_reader(
            child.stdout.take(),
            job.id,
            OutputStream::Stdout,
            Arc::clone(&stdout_buf),
            runtime_tx.clone(),
        ),
        spawn_reader(
            child.stderr.take(),
            job.id,
            OutputStream::Stderr,
            Arc::clone(&stderr_buf),
            runtime_tx.clone(),
        ),
    ];

    let exit = match wait_for_exit(&mut child, &job, handle.cancel_signal()).await {
        Ok(status) => ExitInfo::from_status(status),
        Err(err) => {
            error!(job = %job.id, error = %err, "failed waiting for build process");
            ExitInfo {
                code: None,
                signal: None,
            }
        }
    };

    for reader in readers.into_iter().flatten() {
        detach_reader(job.id, reader).await;
    }

    let state = if handle.is_cancelled() {
        JobState::Cancelled
    } else {
        JobState::Completed(exit)
    };

    info!(
        job = %job.id,
        exit_code = ?exit.code,
        signal = ?exit.signal,
        cancelled = matches!(state, JobState::Cancelled),
        "build process exited"
    );

    handle.set_state(state.clone());

    JobReport {
        id: job.id,
        state,
        exit: Some(exit),
        stdout: take_buffer(&stdout_buf),
        stderr: take_buffer(&stderr_buf),
    }
}

fn shell_command(job: &BuildJob) -> Command {
    let mut cmd = Command::new(SHELL);
    cmd.arg("-l")
        .arg("-c")
        .arg(&job.script)
        .current_dir(&job.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so cancellation reaches the tools the script runs
    // and not only the shell.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// Wait for the child, terminating it if cancellation is requested meanwhile.
async fn wait_for_exit(
    child: &mut Child,
    job: &BuildJob,
    mut cancel_rx: watch::Receiver<bool>,
) -> std::io::Result<std::process::ExitStatus> {
    // Cancelled between the pre-spawn check and here.
    let mut listening = if *cancel_rx.borrow_and_update() {
        terminate(child, job);
        false
    } else {
        true
    };

    loop {
        tokio::select! {
            status = child.wait() => return status,

            changed = cancel_rx.changed(), if listening => {
                match changed {
                    Ok(()) if *cancel_rx.borrow() => {
                        terminate(child, job);
                        listening = false;
                    }
                    Ok(()) => {}
                    // Handle dropped: nobody can cancel any more.
                    Err(_) => listening = false,
                }
            }
        }
    }
}

/// Ask the build to stop. Completion still arrives through `wait_for_exit`.
fn terminate(child: &mut Child, job: &BuildJob) {
    info!(job = %job.id, "cancellation requested; terminating build process");

    if signal_process_group(child, job) {
        return;
    }

    if let Err(err) = child.start_kill() {
        debug!(job = %job.id, error = %err, "kill failed; process probably already exited");
    }
}

/// SIGTERM the child's process group. Returns `false` if that was not
/// possible and the caller should fall back to killing the shell.
#[cfg(unix)]
fn signal_process_group(child: &Child, job: &BuildJob) -> bool {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };

    match killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => true,
        Err(err) => {
            warn!(job = %job.id, error = %err, "failed to signal process group; killing shell");
            false
        }
    }
}

#[cfg(not(unix))]
fn signal_process_group(_child: &Child, _job: &BuildJob) -> bool {
    false
}

fn spawn_reader<R>(
    reader: Option<R>,
    job: JobId,
    stream: OutputStream,
    buffer: SharedBuffer,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Option<JoinHandle<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = reader?;

    Some(tokio::spawn(async move {
        let mut decoder = ChunkDecoder::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    debug!(%job, ?stream, error = %err, "output stream read failed");
                    break;
                }
            };

            buffer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(&chunk[..n]);

            let text = decoder.push(&chunk[..n]);
            if !text.is_empty() && !forward(&runtime_tx, job, stream, text).await {
                return;
            }
        }

        let rest = decoder.finish();
        if !rest.is_empty() {
            forward(&runtime_tx, job, stream, rest).await;
        }
    }))
}

async fn forward(
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    job: JobId,
    stream: OutputStream,
    text: String,
) -> bool {
    runtime_tx
        .send(RuntimeEvent::Build(BuildEvent::Output { job, stream, text }))
        .await
        .is_ok()
}

async fn detach_reader(job: JobId, mut reader: JoinHandle<()>) {
    if tokio::time::timeout(STREAM_DRAIN_TIMEOUT, &mut reader)
        .await
        .is_err()
    {
        warn!(%job, "output stream still open after exit; detaching reader");
        reader.abort();
    }
}

fn take_buffer(buffer: &SharedBuffer) -> Vec<u8> {
    std::mem::take(&mut *buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
}
