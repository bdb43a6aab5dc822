//! Suite files.
//!
//! A suite is a TOML document listing groups of cases plus an optional chart
//! selection:
//!
//! ```toml
//! [defaults]
//! duration = "1s"
//! warmup = 1000
//! socket = "/tmp/kvmbench.sock"
//!
//! [[group]]
//! title = "Rust minimal http server"
//! program = "./rust/target/release/httpserver"
//!
//! [[group.case]]
//! name = "native"
//! ready = { stream = "stderr", prefix = "Listening" }
//! load = { disable_keepalive = true }
//! warmup = {}
//!
//! [[group.case]]
//! name = "kvmserver threads=1"
//! kvmserver = { threads = 1, allow_all = true }
//!
//! [chart]
//! group = "Rust minimal http server"
//! drop_columns = ["average"]
//! title_suffix = " native vs kvmserver"
//! ```
//!
//! Relative paths are resolved against the working directory of the harness.

use anyhow::{Context, bail};
use kvmbench::{BenchCase, BenchGroup, ChartOptions, GroupOutcome, ProcessTimeouts};
use kvmbench_core::{
    DEFAULT_URL, KvmServerOptions, LaunchSpec, LineMatch, LoadTestArgs, OutputStream,
    ReadyPattern, Target, Warmup,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupConfig>,
    pub chart: Option<ChartConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Measurement length for cases that set neither `duration` nor
    /// `requests`.
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// Warmup request count for `warmup` tables without `requests`.
    pub warmup: Option<u64>,
    /// UNIX socket for cases that set neither `url` nor `socket`.
    pub socket: Option<PathBuf>,
    #[serde(default, with = "humantime_serde")]
    pub readiness_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub shutdown_grace: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub title: String,
    /// Inherited by cases that do not name their own program.
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, rename = "case")]
    pub cases: Vec<CaseConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseConfig {
    pub name: String,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub cwd: Option<PathBuf>,
    /// Merged over the group's environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub ready: Option<ReadyConfig>,
    pub kvmserver: Option<KvmServerConfig>,
    #[serde(default)]
    pub load: LoadConfig,
    pub warmup: Option<WarmupConfig>,
    #[serde(default)]
    pub tolerate: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadyConfig {
    #[serde(default)]
    pub stream: OutputStream,
    pub prefix: Option<String>,
    pub contains: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KvmServerConfig {
    pub threads: Option<u32>,
    pub warmup: Option<u32>,
    #[serde(default)]
    pub allow_all: bool,
    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    pub url: Option<String>,
    pub socket: Option<PathBuf>,
    pub concurrency: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
    pub requests: Option<u64>,
    #[serde(default)]
    pub disable_keepalive: bool,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarmupConfig {
    pub requests: Option<u64>,
    pub concurrency: Option<u32>,
    #[serde(default)]
    pub disable_keepalive: bool,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub tolerate: Vec<String>,
}

/// Which group is charted and how its view is trimmed first.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartConfig {
    pub group: String,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default)]
    pub drop_rows: Vec<String>,
    #[serde(default)]
    pub title_suffix: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Suite defaults with command-line overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub duration: Duration,
    pub warmup: Option<u64>,
    pub socket: Option<PathBuf>,
    pub timeouts: ProcessTimeouts,
}

impl Suite {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read suite {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid suite {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Applies the command-line duration override to the suite defaults.
    pub fn settings(&self, duration: Option<Duration>) -> Settings {
        let timeouts = ProcessTimeouts::default();
        Settings {
            duration: duration
                .or(self.defaults.duration)
                .unwrap_or(Duration::from_secs(1)),
            warmup: self.defaults.warmup,
            socket: self.defaults.socket.clone(),
            timeouts: ProcessTimeouts {
                readiness: self.defaults.readiness_timeout.unwrap_or(timeouts.readiness),
                shutdown_grace: self
                    .defaults
                    .shutdown_grace
                    .unwrap_or(timeouts.shutdown_grace),
            },
        }
    }

    /// Builds and validates every group.
    pub fn groups(&self, settings: &Settings) -> anyhow::Result<Vec<BenchGroup>> {
        self.groups
            .iter()
            .map(|group| {
                group
                    .build(settings)
                    .with_context(|| format!("group '{}'", group.title))
            })
            .collect()
    }
}

impl GroupConfig {
    fn build(&self, settings: &Settings) -> anyhow::Result<BenchGroup> {
        let mut group = BenchGroup::new(&self.title);
        for case in &self.cases {
            let built = case
                .build(self, settings)
                .with_context(|| format!("case '{}'", case.name))?;
            group.push(built);
        }
        Ok(group)
    }
}

impl CaseConfig {
    fn build(&self, group: &GroupConfig, settings: &Settings) -> anyhow::Result<BenchCase> {
        let Some(program) = self.program.as_ref().or(group.program.as_ref()) else {
            bail!("no program set on the case or its group");
        };
        let mut launch = LaunchSpec::new(program.as_str())
            .args(self.args.as_ref().unwrap_or(&group.args).iter().cloned());
        if let Some(cwd) = self.cwd.as_ref().or(group.cwd.as_ref()) {
            launch = launch.cwd(cwd);
        }
        for (key, value) in group.env.iter().chain(&self.env) {
            launch = launch.env(key.as_str(), value.as_str());
        }

        let mut builder = match &self.kvmserver {
            Some(config) => BenchCase::kvmserver(&self.name, launch, config.options()),
            None => BenchCase::native(&self.name, launch),
        };
        if let Some(ready) = &self.ready {
            builder = builder.ready(ready.pattern()?);
        }
        builder = builder.load(self.load.args(settings)?);
        if let Some(warmup) = &self.warmup {
            builder = builder.warmup(warmup.warmup(settings)?);
        }
        for label in &self.tolerate {
            builder = builder.tolerate(label.as_str());
        }
        for path in &self.artifacts {
            builder = builder.artifact(path);
        }

        Ok(builder.build()?)
    }
}

impl ReadyConfig {
    fn pattern(&self) -> anyhow::Result<ReadyPattern> {
        let line = match (&self.prefix, &self.contains) {
            (Some(prefix), None) => LineMatch::Prefix(prefix.clone()),
            (None, Some(needle)) => LineMatch::Contains(needle.clone()),
            _ => bail!("ready needs exactly one of 'prefix' or 'contains'"),
        };
        Ok(ReadyPattern::new(self.stream, line))
    }
}

impl KvmServerConfig {
    fn options(&self) -> KvmServerOptions {
        KvmServerOptions {
            threads: self.threads,
            warmup: self.warmup,
            allow_all: self.allow_all,
            ephemeral: self.ephemeral,
        }
    }
}

impl LoadConfig {
    fn args(&self, settings: &Settings) -> anyhow::Result<LoadTestArgs> {
        let target = match (&self.socket, &self.url) {
            (Some(path), url) => Target::Unix {
                path: path.clone(),
                url: url.clone().unwrap_or_else(|| DEFAULT_URL.to_string()),
            },
            (None, Some(url)) => Target::tcp(url.as_str()),
            (None, None) => match &settings.socket {
                Some(path) => Target::unix(path),
                None => Target::default(),
            },
        };

        let mut args = LoadTestArgs::new(target);
        if let Some(concurrency) = self.concurrency {
            args = args.concurrency(concurrency);
        }
        args = match (self.requests, self.duration) {
            (Some(_), Some(_)) => bail!("load sets both 'requests' and 'duration'"),
            (Some(requests), None) => args.requests(requests),
            (None, Some(duration)) => args.duration(duration),
            (None, None) => args.duration(settings.duration),
        };
        if self.disable_keepalive {
            args = args.disable_keepalive();
        }
        if let Some(timeout) = self.timeout {
            args = args.request_timeout(timeout);
        }
        for arg in &self.args {
            args = args.extra_arg(arg.as_str());
        }
        Ok(args)
    }
}

impl WarmupConfig {
    fn warmup(&self, settings: &Settings) -> anyhow::Result<Warmup> {
        let Some(requests) = self.requests.or(settings.warmup) else {
            bail!("warmup needs 'requests' or a [defaults] warmup count");
        };
        let mut warmup = Warmup::requests(requests);
        if let Some(concurrency) = self.concurrency {
            warmup.concurrency = concurrency;
        }
        if self.disable_keepalive {
            warmup = warmup.disable_keepalive();
        }
        if let Some(timeout) = self.timeout {
            warmup = warmup.request_timeout(timeout);
        }
        for label in &self.tolerate {
            warmup = warmup.tolerate(label.as_str());
        }
        Ok(warmup)
    }
}

impl ChartConfig {
    pub fn options(&self) -> ChartOptions {
        let defaults = ChartOptions::default();
        ChartOptions {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
        }
    }

    /// Renders the configured group's chart, or `None` if that group has no
    /// results in `outcomes`.
    pub fn render(&self, outcomes: &[GroupOutcome]) -> Option<String> {
        let Some(outcome) = outcomes
            .iter()
            .find(|o| o.title == self.group && !o.results.is_empty())
        else {
            tracing::warn!("No results for chart group '{}', skipping chart", self.group);
            return None;
        };

        let mut report = outcome.report();
        for column in &self.drop_columns {
            if !report.remove_column(column) {
                tracing::warn!("Chart has no column '{}'", column);
            }
        }
        for row in &self.drop_rows {
            if !report.remove_row(row) {
                tracing::warn!("Chart has no row '{}'", row);
            }
        }
        report.append_title(&self.title_suffix);
        Some(report.to_svg(&self.options()))
    }
}
