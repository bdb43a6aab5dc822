//! Load generator invocation parameters.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// URL requested when no other is configured. oha needs a URL even when it
/// connects over a UNIX socket.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8000/";

/// Label oha reports for requests cut off by `-t`.
pub const DEADLINE_ABORT: &str = "aborted due to deadline";

/// Where the load generator sends requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tcp { url: String },
    Unix { path: PathBuf, url: String },
}

impl Target {
    pub fn tcp(url: impl Into<String>) -> Self {
        Self::Tcp { url: url.into() }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix {
            path: path.into(),
            url: DEFAULT_URL.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Target::Tcp { url } | Target::Unix { url, .. } => url,
        }
    }

    pub fn socket_path(&self) -> Option<&PathBuf> {
        match self {
            Target::Tcp { .. } => None,
            Target::Unix { path, .. } => Some(path),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::tcp(DEFAULT_URL)
    }
}

/// When a load test ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    Duration(Duration),
    Requests(u64),
}

impl Default for StopCondition {
    fn default() -> Self {
        Self::Duration(Duration::from_secs(1))
    }
}

/// One load generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTestArgs {
    pub target: Target,
    pub concurrency: u32,
    pub stop: StopCondition,
    pub disable_keepalive: bool,
    /// Per-request client timeout (`-t`).
    pub request_timeout: Option<Duration>,
    pub extra_args: Vec<String>,
}

impl Default for LoadTestArgs {
    fn default() -> Self {
        Self {
            target: Target::default(),
            concurrency: 1,
            stop: StopCondition::default(),
            disable_keepalive: false,
            request_timeout: None,
            extra_args: Vec::new(),
        }
    }
}

impl LoadTestArgs {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.stop = StopCondition::Duration(duration);
        self
    }

    pub fn requests(mut self, requests: u64) -> Self {
        self.stop = StopCondition::Requests(requests);
        self
    }

    pub fn disable_keepalive(mut self) -> Self {
        self.disable_keepalive = true;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "load test concurrency must be at least 1".to_string(),
            ));
        }
        match self.stop {
            StopCondition::Duration(d) if d.is_zero() => Err(Error::InvalidConfig(
                "load test duration must be positive".to_string(),
            )),
            StopCondition::Requests(0) => Err(Error::InvalidConfig(
                "load test request count must be at least 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Arguments for an oha-compatible load generator, URL last.
    pub fn oha_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Target::Unix { path, .. } = &self.target {
            args.push(format!("--unix-socket={}", path.display()));
        }
        if self.disable_keepalive {
            args.push("--disable-keepalive".to_string());
        }
        args.push(format!("-c={}", self.concurrency));
        match self.stop {
            StopCondition::Duration(d) => {
                args.push(format!("-z={}", humantime::format_duration(d)))
            }
            StopCondition::Requests(n) => args.push(format!("-n={n}")),
        }
        if let Some(timeout) = self.request_timeout {
            args.push(format!("-t={}", humantime::format_duration(timeout)));
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("--wait-ongoing-requests-after-deadline".to_string());
        args.push("--no-tui".to_string());
        args.push("--output-format=json".to_string());
        args.push(self.target.url().to_string());
        args
    }
}

/// Requests sent before measurement to get the candidate's caches hot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warmup {
    pub requests: u64,
    pub concurrency: u32,
    pub disable_keepalive: bool,
    pub request_timeout: Option<Duration>,
    /// Error labels that do not fail the warmup.
    pub tolerate: Vec<String>,
}

impl Warmup {
    pub fn requests(requests: u64) -> Self {
        Self {
            requests,
            concurrency: 1,
            disable_keepalive: false,
            request_timeout: None,
            tolerate: Vec::new(),
        }
    }

    pub fn disable_keepalive(mut self) -> Self {
        self.disable_keepalive = true;
        self
    }

    /// Aborts each request after `timeout` and tolerates the resulting
    /// deadline errors.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        if !self.tolerate.iter().any(|l| l == DEADLINE_ABORT) {
            self.tolerate.push(DEADLINE_ABORT.to_string());
        }
        self
    }

    pub fn tolerate(mut self, label: impl Into<String>) -> Self {
        self.tolerate.push(label.into());
        self
    }

    /// Load test aimed at the same target as `measure`.
    pub fn load_args(&self, measure: &LoadTestArgs) -> LoadTestArgs {
        LoadTestArgs {
            target: measure.target.clone(),
            concurrency: self.concurrency,
            stop: StopCondition::Requests(self.requests),
            disable_keepalive: self.disable_keepalive,
            request_timeout: self.request_timeout,
            extra_args: Vec::new(),
        }
    }
}
