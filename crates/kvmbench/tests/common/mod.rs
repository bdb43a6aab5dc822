//! Shared helpers: a scripted load generator and `sh` candidates.

#![allow(dead_code)]

use async_trait::async_trait;
use kvmbench::LoadGenerator;
use kvmbench_core::{LaunchSpec, LoadTestArgs, LoadTestResult, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Returns queued reports in order, then empty successful ones. Records the
/// arguments of every invocation.
#[derive(Default)]
pub struct ScriptedLoad {
    reports: Mutex<VecDeque<LoadTestResult>>,
    calls: Mutex<Vec<LoadTestArgs>>,
    delay: Option<Duration>,
}

impl ScriptedLoad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, report: LoadTestResult) -> Self {
        self.reports.lock().unwrap().push_back(report);
        self
    }

    /// Makes every run take `delay` before it reports.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<LoadTestArgs> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoadGenerator for ScriptedLoad {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, args: &LoadTestArgs) -> Result<LoadTestResult> {
        self.calls.lock().unwrap().push(args.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let report = self.reports.lock().unwrap().pop_front();
        Ok(report.unwrap_or_else(|| with_average(0.00005)))
    }
}

pub fn with_average(seconds: f64) -> LoadTestResult {
    let mut report = LoadTestResult::default();
    report.summary.success_rate = 1.0;
    report.summary.average = Some(seconds);
    report.latency_percentiles.p50 = Some(seconds);
    report.latency_percentiles.p90 = Some(seconds * 1.2);
    report.latency_percentiles.p99 = Some(seconds * 2.0);
    report
}

pub fn with_errors(errors: &[(&str, u64)]) -> LoadTestResult {
    let mut report = with_average(0.00005);
    report.error_distribution = errors
        .iter()
        .map(|(label, count)| (label.to_string(), *count))
        .collect::<BTreeMap<_, _>>();
    report
}

/// A candidate running `script` under `sh -c`.
pub fn sh(script: &str) -> LaunchSpec {
    LaunchSpec::new("sh").arg("-c").arg(script)
}

/// A candidate that refuses to start while `$SOCK` exists, creates it, then
/// announces readiness on stderr and idles.
pub fn socket_server() -> LaunchSpec {
    sh(r#"test ! -e "$SOCK" || exit 3; touch "$SOCK"; echo "Listening on $SOCK" >&2; exec sleep 30"#)
}
