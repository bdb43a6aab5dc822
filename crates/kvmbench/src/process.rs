//! Candidate server processes.
//!
//! A [`ServerProcess`] owns one spawned candidate, the tasks draining its
//! output streams and the filesystem [`Artifacts`] it leaves behind (UNIX
//! sockets). [`ServerProcess::shutdown`] terminates the process and removes
//! the artifacts; it is idempotent and `Drop` falls back to a hard kill plus
//! artifact removal if it was never called.

use crate::watcher::{echo_lines, watch_lines};
use kvmbench_core::{CommandLine, Error, LaunchSpec, OutputStream, ReadyPattern, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Timeouts applied around a candidate's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTimeouts {
    /// Upper bound on waiting for the readiness line.
    pub readiness: Duration,
    /// Time between SIGTERM and SIGKILL during teardown.
    pub shutdown_grace: Duration,
}

impl Default for ProcessTimeouts {
    fn default() -> Self {
        Self {
            readiness: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Files removed when a case ends, whether or not the process ever started.
#[derive(Debug, Default)]
pub struct Artifacts {
    paths: Vec<PathBuf>,
}

impl Artifacts {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Removes every artifact. Failures are logged, never returned.
    pub fn remove_all(&mut self) {
        for path in self.paths.drain(..) {
            remove_artifact(&path);
        }
    }
}

impl Drop for Artifacts {
    fn drop(&mut self) {
        self.remove_all();
    }
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed artifact {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to clean up artifact {:?}: {}", path, e),
    }
}

/// A running candidate server.
pub struct ServerProcess {
    name: String,
    child: Child,
    drains: [JoinHandle<()>; 2],
    artifacts: Artifacts,
    shutdown_grace: Duration,
    torn_down: bool,
}

impl ServerProcess {
    /// Spawns `command` and waits for its readiness line.
    ///
    /// If readiness fails the process is torn down before the error is
    /// returned. `artifacts` are removed on every failure path.
    pub async fn start(
        name: &str,
        command: &CommandLine,
        launch: &LaunchSpec,
        ready: &ReadyPattern,
        artifacts: Artifacts,
        timeouts: ProcessTimeouts,
    ) -> Result<Self> {
        tracing::debug!(case = name, "Spawning: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&launch.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &launch.cwd {
            cmd.current_dir(cwd);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::SpawnFailed(format!("{}: {}", command.program, e)))?;

        let stdout: Box<dyn AsyncRead + Unpin + Send> = Box::new(
            child
                .stdout
                .take()
                .ok_or_else(|| Error::SpawnFailed("stdout was not captured".to_string()))?,
        );
        let stderr: Box<dyn AsyncRead + Unpin + Send> = Box::new(
            child
                .stderr
                .take()
                .ok_or_else(|| Error::SpawnFailed("stderr was not captured".to_string()))?,
        );
        // Never inherited: the harness's stdout carries only the report.
        let (readiness, other, other_stream) = match ready.stream {
            OutputStream::Stdout => (stdout, stderr, OutputStream::Stderr),
            OutputStream::Stderr => (stderr, stdout, OutputStream::Stdout),
        };
        let (signal, watcher) = watch_lines(readiness, ready.clone(), name.to_string());
        let echo = echo_lines(other, other_stream, name.to_string());

        let mut server = Self {
            name: name.to_string(),
            child,
            drains: [watcher, echo],
            artifacts,
            shutdown_grace: timeouts.shutdown_grace,
            torn_down: false,
        };
        tracing::info!(case = name, pid = ?server.pid(), "Started, waiting for '{}' on {}", ready, ready.stream);

        let raced = timeout(timeouts.readiness, server.race(signal.wait())).await;
        let readiness = match raced {
            Ok(Ok(_line)) => Ok(()),
            Ok(Err(Error::ReadinessStreamClosed { pattern })) => {
                server.await_exit_after_close(pattern, timeouts.readiness).await
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::ReadinessTimeout {
                pattern: ready.to_string(),
                timeout: timeouts.readiness,
            }),
        };

        match readiness {
            Ok(()) => {
                tracing::info!(case = name, "Ready");
                Ok(server)
            }
            Err(e) => {
                server.shutdown().await;
                Err(e)
            }
        }
    }

    // The stream usually closes because the process is exiting; report the
    // exit code when it does.
    async fn await_exit_after_close(&mut self, pattern: String, limit: Duration) -> Result<()> {
        match timeout(limit, self.child.wait()).await {
            Ok(Ok(status)) => Err(Error::ProcessExitedEarly {
                code: status.code(),
            }),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(Error::ReadinessStreamClosed { pattern }),
        }
    }

    /// Runs `fut` to completion unless the process exits first, in which
    /// case `fut` is dropped and [`Error::ProcessExitedEarly`] is returned.
    pub async fn race<F, T>(&mut self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let name = &self.name;
        tokio::select! {
            biased;
            result = fut => result,
            status = self.child.wait() => {
                let status = status?;
                tracing::warn!(case = %name, "Exited unexpectedly: {}", status);
                Err(Error::ProcessExitedEarly { code: status.code() })
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Terminates the process and removes the artifacts. Safe to call more
    /// than once.
    pub async fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.terminate().await;
        self.abort_drains();
        self.artifacts.remove_all();
        tracing::info!(case = %self.name, "Torn down");
    }

    async fn terminate(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(case = %self.name, "Already exited: {}", status);
                return;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(case = %self.name, "Failed to poll process: {}", e),
        }

        self.send_sigterm();

        match timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(case = %self.name, "Exited: {}", status),
            Ok(Err(e)) => tracing::warn!(case = %self.name, "Failed to wait for process: {}", e),
            Err(_) => {
                tracing::warn!(
                    case = %self.name,
                    "Did not exit within {}, killing",
                    humantime::format_duration(self.shutdown_grace)
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(case = %self.name, "Failed to kill process: {}", e);
                }
            }
        }
    }

    fn abort_drains(&self) {
        for drain in &self.drains {
            drain.abort();
        }
    }

    #[cfg(unix)]
    fn send_sigterm(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Some(pid) = self.child.id() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!(case = %self.name, "Failed to send SIGTERM: {}", e);
            }
        }
    }

    #[cfg(not(unix))]
    fn send_sigterm(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!(case = %self.name, "Failed to kill process: {}", e);
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if !self.torn_down {
            tracing::warn!(case = %self.name, "Dropped without shutdown, killing");
            let _ = self.child.start_kill();
            self.abort_drains();
            self.artifacts.remove_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod artifacts {
        use super::*;

        #[test]
        fn remove_all_deletes_files() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bench.sock");
            std::fs::write(&path, b"").unwrap();

            let mut artifacts = Artifacts::new([path.clone()]);
            artifacts.remove_all();

            assert!(!path.exists());
            assert!(artifacts.paths().is_empty());
        }

        #[test]
        fn missing_files_are_ignored() {
            let mut artifacts = Artifacts::new([PathBuf::from("/nonexistent/bench.sock")]);
            artifacts.remove_all();
            artifacts.remove_all();
        }

        #[test]
        fn drop_removes_files() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bench.sock");
            std::fs::write(&path, b"").unwrap();

            drop(Artifacts::new([path.clone()]));
            assert!(!path.exists());
        }
    }

    #[test]
    fn default_timeouts() {
        let timeouts = ProcessTimeouts::default();
        assert_eq!(timeouts.readiness, Duration::from_secs(30));
        assert_eq!(timeouts.shutdown_grace, Duration::from_secs(5));
    }
}
