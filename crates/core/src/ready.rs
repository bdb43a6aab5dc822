//! Readiness predicates over candidate output.

use serde::Deserialize;
use std::fmt;

/// Which standard stream of the candidate carries its readiness line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    #[default]
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    Prefix(String),
    Contains(String),
}

/// A line predicate bound to one output stream.
///
/// kvmserver announces itself with a stdout line starting with `Program`;
/// most native servers print `Listening` on stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyPattern {
    pub stream: OutputStream,
    pub line: LineMatch,
}

impl ReadyPattern {
    pub fn new(stream: OutputStream, line: LineMatch) -> Self {
        Self { stream, line }
    }

    pub fn stdout_prefix(prefix: impl Into<String>) -> Self {
        Self::new(OutputStream::Stdout, LineMatch::Prefix(prefix.into()))
    }

    pub fn stderr_prefix(prefix: impl Into<String>) -> Self {
        Self::new(OutputStream::Stderr, LineMatch::Prefix(prefix.into()))
    }

    /// The line kvmserver prints once the guest program is loaded.
    pub fn kvmserver() -> Self {
        Self::stdout_prefix("Program")
    }

    pub fn matches(&self, line: &str) -> bool {
        match &self.line {
            LineMatch::Prefix(prefix) => line.starts_with(prefix.as_str()),
            LineMatch::Contains(needle) => line.contains(needle.as_str()),
        }
    }

    pub fn needle(&self) -> &str {
        match &self.line {
            LineMatch::Prefix(s) | LineMatch::Contains(s) => s,
        }
    }
}

impl fmt::Display for ReadyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.needle())
    }
}
