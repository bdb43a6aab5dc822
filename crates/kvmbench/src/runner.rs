//! Runs a single benchmark case.
//!
//! Spawn, wait for readiness, warm up, measure, tear down. The process is
//! shut down on every path out of [`BenchRunner::run_case`], and the case's
//! artifacts are removed even when the spawn itself fails.

use crate::case::BenchCase;
use crate::loadgen::{LoadGenerator, run_checked};
use crate::locate::find_binary;
use crate::process::{Artifacts, ProcessTimeouts, ServerProcess};
use kvmbench_core::{CommandLine, LoadTestResult, NamedResult, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Shared settings for running cases.
pub struct BenchRunner {
    load_generator: Arc<dyn LoadGenerator>,
    kvmserver: Option<PathBuf>,
    timeouts: ProcessTimeouts,
}

impl BenchRunner {
    pub fn new(load_generator: Arc<dyn LoadGenerator>) -> Self {
        Self {
            load_generator,
            kvmserver: None,
            timeouts: ProcessTimeouts::default(),
        }
    }

    /// Uses this kvmserver binary instead of searching `KVMSERVER_PATH` and
    /// `PATH`.
    pub fn kvmserver_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kvmserver = Some(path.into());
        self
    }

    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.readiness = timeout;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.timeouts.shutdown_grace = grace;
        self
    }

    pub fn load_generator(&self) -> &dyn LoadGenerator {
        self.load_generator.as_ref()
    }

    /// The command line a case will be spawned with.
    pub fn command_line(&self, case: &BenchCase) -> Result<CommandLine> {
        match case.kvmserver_options() {
            Some(options) => {
                let kvmserver = find_binary("kvmserver", "KVMSERVER_PATH", self.kvmserver.as_deref())?;
                Ok(CommandLine::kvmserver(&kvmserver, options, case.launch()))
            }
            None => Ok(CommandLine::native(case.launch())),
        }
    }

    /// Runs one case to completion and tears it down.
    pub async fn run_case(&self, case: &BenchCase) -> Result<NamedResult> {
        tracing::info!(case = case.name(), "Running case");

        let artifacts = Artifacts::new(case.artifacts().iter().cloned());
        let command = self.command_line(case)?;

        let mut server = ServerProcess::start(
            case.name(),
            &command,
            case.launch(),
            case.ready(),
            artifacts,
            self.timeouts,
        )
        .await?;

        let outcome = self.exercise(&mut server, case).await;
        server.shutdown().await;

        outcome.map(|result| NamedResult::new(case.name(), result))
    }

    async fn exercise(&self, server: &mut ServerProcess, case: &BenchCase) -> Result<LoadTestResult> {
        let generator = self.load_generator.as_ref();

        if let Some(warmup) = case.warmup() {
            tracing::info!(case = case.name(), requests = warmup.requests, "Warming up");
            let args = warmup.load_args(case.load());
            server
                .race(run_checked(generator, &args, &warmup.tolerate))
                .await?;
        }

        tracing::info!(case = case.name(), "Measuring");
        server
            .race(run_checked(generator, case.load(), case.tolerate()))
            .await
    }
}
