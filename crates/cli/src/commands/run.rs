//! The `run` command - runs a benchmark suite and writes the reports.

use crate::suite::Suite;
use clap::Args;
use kvmbench::report::{render_document, write_artifacts};
use kvmbench::{BenchRunner, FailurePolicy, GroupOutcome, Oha, Report};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the suite file
    #[arg(long, short)]
    config: PathBuf,

    /// Only run cases whose name contains this string (repeatable)
    #[arg(long, short)]
    filter: Vec<String>,

    /// Measurement duration for cases without their own (e.g. 1s, 500ms)
    #[arg(long, short, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Directory for bench.md and bench.svg
    #[arg(long, short, default_value = "target")]
    output: PathBuf,

    /// kvmserver binary (defaults to $KVMSERVER_PATH, then PATH)
    #[arg(long)]
    kvmserver: Option<PathBuf>,

    /// oha binary (defaults to $OHA_PATH, then PATH)
    #[arg(long)]
    oha: Option<PathBuf>,

    /// Stop at the first failed case
    #[arg(long)]
    abort_on_failure: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let suite = Suite::load(&args.config)?;
    let settings = suite.settings(args.duration);
    let groups = suite.groups(&settings)?;

    let oha = Oha::locate(args.oha.as_deref())?;
    let mut runner = BenchRunner::new(Arc::new(oha))
        .readiness_timeout(settings.timeouts.readiness)
        .shutdown_grace(settings.timeouts.shutdown_grace);
    if let Some(path) = &args.kvmserver {
        runner = runner.kvmserver_path(path);
    }

    let policy = if args.abort_on_failure {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Continue
    };

    let mut outcomes: Vec<GroupOutcome> = Vec::new();
    for group in groups {
        let group = group.policy(policy);
        let outcome = group.run(&runner, &args.filter).await;
        let stop = policy == FailurePolicy::Abort && !outcome.is_success();
        outcomes.push(outcome);
        if stop {
            break;
        }
    }

    let reports: Vec<Report<'_>> = outcomes
        .iter()
        .filter(|o| !o.results.is_empty())
        .map(GroupOutcome::report)
        .collect();
    let chart = suite.chart.as_ref().and_then(|c| c.render(&outcomes));
    let markdown = render_document(&reports, chart.is_some());

    println!("{markdown}");
    write_artifacts(&args.output, &markdown, chart.as_deref())?;

    report_failures(&outcomes)
}

fn report_failures(outcomes: &[GroupOutcome]) -> anyhow::Result<()> {
    let executed: usize = outcomes.iter().map(|o| o.executed).sum();
    if executed == 0 {
        tracing::warn!("No cases matched the filter");
    }

    let mut failed = 0;
    for outcome in outcomes {
        for failure in &outcome.failures {
            failed += 1;
            eprintln!(
                "FAILED {} / {}: {}: {}",
                outcome.title,
                failure.name,
                failure.error.kind(),
                failure.error
            );
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {executed} cases failed");
    }
    Ok(())
}
