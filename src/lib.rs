// src/lib.rs

pub mod artifact;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod template;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::artifact::ArtifactEvent;
use crate::cli::CliArgs;
use crate::config::{FilePreferences, PreferenceSource, default_config_path};
use crate::exec::RealBuildBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::{
    BuildCore, BuildEvent, ConsoleListener, LogViewer, Runtime, RuntimeEvent, RuntimeOptions,
};
use crate::template::{DocumentPaths, is_blank_script};

/// Capacity of the runtime event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - preference loading
/// - build core / runtime
/// - build backend
/// - document and artifact watching
/// - Ctrl-C and stdin commands
pub async fn run(args: CliArgs) -> Result<i32> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let document = fs
        .canonicalize(&args.document)
        .with_context(|| format!("document {:?} not found", args.document))?;
    if !fs.is_file(&document) {
        bail!("document {:?} is not a file", document);
    }

    let config_path = match args.config {
        Some(ref path) => {
            if !fs.is_file(path) {
                bail!("config file {:?} not found", path);
            }
            path.clone()
        }
        None => default_config_path(&document),
    };
    debug!(?config_path, "preferences file");

    let prefs: Arc<dyn PreferenceSource> = Arc::new(
        FilePreferences::open(&config_path, Arc::clone(&fs), args.overrides())
            .with_context(|| format!("loading config {:?}", config_path))?,
    );

    if args.dry_run {
        print_dry_run(&document, &config_path, prefs.as_ref())?;
        return Ok(0);
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);

    let backend = RealBuildBackend::new(rt_tx.clone());
    let core = BuildCore::new(RuntimeOptions {
        exit_when_idle: args.once,
    });
    let listener = ConsoleListener {
        mark_clears: !args.once,
    };

    let runtime = Runtime::new(
        core,
        (rt_tx.clone(), rt_rx),
        backend,
        prefs,
        fs,
        Box::new(listener),
        Box::new(LogViewer),
    );

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    rt_tx
        .send(BuildEvent::SetDocument(Some(document.clone())).into())
        .await?;

    if args.once {
        rt_tx.send(BuildEvent::RunNow.into()).await?;
    } else {
        info!(?document, "watching; commands: b = build, r = reload, q = quit");
        spawn_stdin_commands(rt_tx.clone());
    }
    drop(rt_tx);

    let summary = runtime.run().await?;

    if args.once && !summary.last_build_succeeded() {
        return Ok(1);
    }
    Ok(0)
}

/// A command typed on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinCommand {
    Build,
    Reload,
    Quit,
}

impl StdinCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "b" | "build" => Some(StdinCommand::Build),
            "r" | "reload" => Some(StdinCommand::Reload),
            "q" | "quit" => Some(StdinCommand::Quit),
            _ => None,
        }
    }

    fn event(self) -> RuntimeEvent {
        match self {
            StdinCommand::Build => BuildEvent::RunNow.into(),
            StdinCommand::Reload => ArtifactEvent::ReloadRequested.into(),
            StdinCommand::Quit => RuntimeEvent::ShutdownRequested,
        }
    }
}

fn spawn_stdin_commands(tx: mpsc::Sender<RuntimeEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let Some(command) = StdinCommand::parse(&line) else {
                eprintln!("unknown command {:?}; use b (build), r (reload) or q (quit)", line.trim());
                continue;
            };
            if tx.send(command.event()).await.is_err() || command == StdinCommand::Quit {
                break;
            }
        }
        debug!("stdin closed; no more commands");
    });
}

/// Simple dry-run output: print paths, preferences and the rendered script.
fn print_dry_run(document: &Path, config_path: &Path, prefs: &dyn PreferenceSource) -> Result<()> {
    let paths = DocumentPaths::from_document(document)
        .with_context(|| format!("cannot derive paths from {:?}", document))?;
    let prefs = prefs.load();
    let script = prefs.script.render(&paths);

    println!("livebuild dry-run");
    println!("  document    = {}", paths.file_path.display());
    println!("  config      = {}", display_config(config_path));
    println!("  working dir = {}", paths.dir_path.display());
    println!(
        "  artifact    = {}",
        paths.artifact_path(&prefs.artifact_extension).display()
    );
    println!("  auto build  = {}", prefs.auto_build_enabled);
    println!("  delay       = {:?}", prefs.auto_build_delay);
    println!();

    if is_blank_script(&script) {
        println!("script: (empty; builds would be refused)");
    } else {
        println!("script:");
        for line in script.lines() {
            println!("  {line}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn display_config(path: &Path) -> String {
    if path.is_file() {
        path.display().to_string()
    } else {
        format!("{} (not found; defaults)", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_commands_parse_short_and_long_forms() {
        assert_eq!(StdinCommand::parse("b\n"), Some(StdinCommand::Build));
        assert_eq!(StdinCommand::parse(" reload "), Some(StdinCommand::Reload));
        assert_eq!(StdinCommand::parse("q"), Some(StdinCommand::Quit));
        assert_eq!(StdinCommand::parse("x"), None);
    }
}
