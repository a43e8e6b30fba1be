// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::PreferenceOverrides;

/// Command-line arguments for `livebuild`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "livebuild",
    version,
    about = "Rebuild a document whenever it changes and announce the fresh artifact.",
    long_about = None
)]
pub struct CliArgs {
    /// The source document to watch (e.g. `paper.tex`).
    #[arg(value_name = "DOCUMENT")]
    pub document: PathBuf,

    /// Path to the config file (TOML).
    ///
    /// Default: `livebuild.toml` next to the document, if it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Build automatically after the document is written.
    #[arg(long)]
    pub auto: bool,

    /// Quiet period in seconds before an automatic build (0 to 60).
    #[arg(long, value_name = "SECONDS")]
    pub delay: Option<f64>,

    /// Build script template; `{filepath}`, `{filename}`, `{fileext}` and
    /// `{dirpath}` are substituted.
    #[arg(long, value_name = "SCRIPT")]
    pub script: Option<String>,

    /// Extension of the built artifact (default `pdf`).
    #[arg(long = "artifact-ext", value_name = "EXT")]
    pub artifact_ext: Option<String>,

    /// Build once, then exit with the build's status.
    #[arg(long)]
    pub once: bool,

    /// Print the rendered build script and paths, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LIVEBUILD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Preference values given on the command line; they win over the
    /// config file.
    pub fn overrides(&self) -> PreferenceOverrides {
        PreferenceOverrides {
            auto_build: self.auto.then_some(true),
            delay_secs: self.delay,
            script: self.script.clone(),
            artifact_extension: self.artifact_ext.clone(),
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
