//! Ordered groups of benchmark cases.
//!
//! Cases in a group bind the same address or socket path, so they run one
//! at a time: a case is fully torn down before the next one spawns.

use crate::case::BenchCase;
use crate::report::Report;
use crate::runner::BenchRunner;
use kvmbench_core::{Error, NamedResult};

/// What a group does after a case fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and run the remaining cases.
    #[default]
    Continue,
    /// Stop at the first failure.
    Abort,
}

/// A failed case and why it failed.
#[derive(Debug)]
pub struct CaseFailure {
    pub name: String,
    pub error: Error,
}

/// Results of one group run, in case order.
#[derive(Debug)]
pub struct GroupOutcome {
    pub title: String,
    pub results: Vec<NamedResult>,
    pub failures: Vec<CaseFailure>,
    /// Number of cases that were started.
    pub executed: usize,
}

impl GroupOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// A report view over the results. The results themselves stay untouched.
    pub fn report(&self) -> Report<'_> {
        Report::new(self.title.clone(), &self.results)
    }
}

/// A named, ordered comparison such as "native vs kvmserver ephemeral".
#[derive(Debug, Clone)]
pub struct BenchGroup {
    title: String,
    cases: Vec<BenchCase>,
    policy: FailurePolicy,
}

impl BenchGroup {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            cases: Vec::new(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn case(mut self, case: BenchCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn push(&mut self, case: BenchCase) {
        self.cases.push(case);
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: FailurePolicy) {
        self.policy = policy;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cases(&self) -> &[BenchCase] {
        &self.cases
    }

    /// Cases selected by `filters`, in order.
    pub fn selected<'a>(&'a self, filters: &'a [String]) -> impl Iterator<Item = &'a BenchCase> {
        self.cases.iter().filter(move |case| case.matches(filters))
    }

    /// Runs every selected case in order.
    pub async fn run(&self, runner: &BenchRunner, filters: &[String]) -> GroupOutcome {
        let mut outcome = GroupOutcome {
            title: self.title.clone(),
            results: Vec::new(),
            failures: Vec::new(),
            executed: 0,
        };

        for case in self.selected(filters) {
            outcome.executed += 1;
            match runner.run_case(case).await {
                Ok(result) => outcome.results.push(result),
                Err(error) => {
                    tracing::error!(
                        group = %self.title,
                        case = case.name(),
                        kind = error.kind(),
                        "Case failed: {}",
                        error
                    );
                    outcome.failures.push(CaseFailure {
                        name: case.name().to_string(),
                        error,
                    });
                    if self.policy == FailurePolicy::Abort {
                        break;
                    }
                }
            }
        }

        outcome
    }
}
