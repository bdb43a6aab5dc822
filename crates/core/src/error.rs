use std::collections::BTreeMap;
use std::time::Duration;

/// Errors that can occur while running a benchmark case.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("process exited unexpectedly (exit code: {})", display_code(.code))]
    ProcessExitedEarly { code: Option<i32> },

    #[error("load generator exited with code {}: {stderr}", display_code(.code))]
    LoadGeneratorFailed { code: Option<i32>, stderr: String },

    #[error("unexpected response errors: {}", display_distribution(.errors))]
    UnexpectedResponseErrors { errors: BTreeMap<String, u64> },

    #[error("no readiness line matching '{pattern}' within {}", display_duration(.timeout))]
    ReadinessTimeout { pattern: String, timeout: Duration },

    #[error("output stream closed before a readiness line matching '{pattern}' appeared")]
    ReadinessStreamClosed { pattern: String },

    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("binary '{name}' not found")]
    BinaryNotFound { name: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid load generator report: {0}")]
    InvalidReport(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short, stable name of the error kind for console summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ProcessExitedEarly { .. } => "ProcessExitedEarly",
            Error::LoadGeneratorFailed { .. } => "LoadGeneratorFailed",
            Error::UnexpectedResponseErrors { .. } => "UnexpectedResponseErrors",
            Error::ReadinessTimeout { .. } => "ReadinessTimeout",
            Error::ReadinessStreamClosed { .. } => "ReadinessStreamClosed",
            Error::SpawnFailed(_) => "SpawnFailed",
            Error::BinaryNotFound { .. } => "BinaryNotFound",
            Error::InvalidConfig(_) => "InvalidConfig",
            Error::InvalidReport(_) => "InvalidReport",
            Error::Io(_) => "Io",
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

fn display_duration(duration: &Duration) -> String {
    humantime::format_duration(*duration).to_string()
}

fn display_distribution(errors: &BTreeMap<String, u64>) -> String {
    errors
        .iter()
        .map(|(label, count)| format!("{label:?}: {count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
