//! Load generators.
//!
//! [`Oha`] shells out to an oha-compatible binary and parses its JSON report.
//! The [`LoadGenerator`] trait is the seam tests use to substitute canned
//! reports.

use crate::locate::find_binary;
use async_trait::async_trait;
use kvmbench_core::{Error, LoadTestArgs, LoadTestResult, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[async_trait]
pub trait LoadGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs one load test and returns the parsed report.
    async fn run(&self, args: &LoadTestArgs) -> Result<LoadTestResult>;
}

/// Runs a load test and rejects reports whose error distribution contains a
/// label outside `tolerated`.
pub async fn run_checked(
    generator: &dyn LoadGenerator,
    args: &LoadTestArgs,
    tolerated: &[String],
) -> Result<LoadTestResult> {
    let result = generator.run(args).await?;
    result.ensure_no_errors(tolerated)?;
    Ok(result)
}

/// The oha HTTP load generator.
pub struct Oha {
    path: PathBuf,
}

impl Oha {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Finds oha via `explicit`, `OHA_PATH` or `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        find_binary("oha", "OHA_PATH", explicit).map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LoadGenerator for Oha {
    fn name(&self) -> &'static str {
        "oha"
    }

    async fn run(&self, args: &LoadTestArgs) -> Result<LoadTestResult> {
        let argv = args.oha_args();
        tracing::info!("{} {}", self.path.display(), argv.join(" "));

        let output = Command::new(&self.path)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::SpawnFailed(format!("{}: {}", self.path.display(), e)))?;

        if !output.status.success() {
            return Err(Error::LoadGeneratorFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        LoadTestResult::from_json(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_oha(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("oha");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_stdout_report() {
        let dir = tempfile::tempdir().unwrap();
        let oha = Oha::new(fake_oha(
            dir.path(),
            r#"echo '{"summary":{"successRate":1.0,"average":0.0001},"errorDistribution":{}}'"#,
        ));

        let result = oha.run(&LoadTestArgs::default()).await.unwrap();
        assert_eq!(result.summary.average, Some(0.0001));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_rendered_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("argv");
        let oha = Oha::new(fake_oha(
            dir.path(),
            &format!(r#"printf '%s\n' "$*" > {}; echo '{{}}'"#, log.display()),
        ));

        let args = LoadTestArgs::default().requests(100);
        oha.run(&args).await.unwrap();

        let argv = std::fs::read_to_string(&log).unwrap();
        assert_eq!(argv.trim(), args.oha_args().join(" "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let oha = Oha::new(fake_oha(dir.path(), "echo 'connection refused' >&2; exit 2"));

        match oha.run(&LoadTestArgs::default()).await {
            Err(Error::LoadGeneratorFailed { code, stderr }) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "connection refused");
            }
            other => panic!("expected LoadGeneratorFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn garbage_output_is_invalid_report() {
        let dir = tempfile::tempdir().unwrap();
        let oha = Oha::new(fake_oha(dir.path(), "echo 'Summary:'"));

        let err = oha.run(&LoadTestArgs::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidReport(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_checked_rejects_untolerated_errors() {
        let dir = tempfile::tempdir().unwrap();
        let oha = Oha::new(fake_oha(
            dir.path(),
            r#"echo '{"errorDistribution":{"aborted due to deadline":3}}'"#,
        ));

        let args = LoadTestArgs::default();
        let err = run_checked(&oha, &args, &[]).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponseErrors { .. }));

        let tolerated = vec!["aborted due to deadline".to_string()];
        assert!(run_checked(&oha, &args, &tolerated).await.is_ok());
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let oha = Oha::new("/nonexistent/oha");
        let err = oha.run(&LoadTestArgs::default()).await.unwrap_err();
        assert!(matches!(err, Error::SpawnFailed(_)));
    }
}
