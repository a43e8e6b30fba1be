// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running build scripts, using
//! `tokio::process::Command`, and reporting back to the pipeline runtime via
//! `RuntimeEvent`s.
//!
//! - [`job`] holds the job request, its control handle and its final report.
//! - [`runner`] runs a single build process and streams its output.
//! - [`decode`] turns raw output chunks into text without splitting
//!   characters.
//! - [`queue`] owns the worker loop that runs jobs one at a time.
//! - [`backend`] provides the `BuildBackend` trait and a concrete
//!   `RealBuildBackend` that the runtime uses in production, and which tests
//!   can replace with a fake implementation.

pub mod backend;
pub mod decode;
pub mod job;
pub mod queue;
pub mod runner;

pub use backend::{BuildBackend, RealBuildBackend};
pub use job::{BuildJob, ExitInfo, JobHandle, JobReport, JobState};
pub use queue::{WorkQueue, spawn_work_queue};
pub use runner::run_job;
