//! Benchmark harness comparing HTTP servers run natively against the same
//! servers hosted by `kvmserver` microVMs.
//!
//! A [`BenchGroup`] runs its cases one at a time. Each case spawns a
//! candidate, waits for its readiness line, optionally warms it up, measures
//! it with a [`LoadGenerator`] and tears it down before the next case
//! starts. Results feed [`Report`] views that render Markdown tables and SVG
//! bar charts.
//!
//! ```rust,no_run
//! use kvmbench::{BenchCase, BenchGroup, BenchRunner, Oha, Report};
//! use kvmbench_core::{KvmServerOptions, LaunchSpec, LoadTestArgs, Target, Warmup};
//! use std::sync::Arc;
//!
//! # async fn example() -> kvmbench::Result<()> {
//! let launch = LaunchSpec::new("./target/release/httpserver");
//! let load = LoadTestArgs::new(Target::unix("/tmp/bench.sock"));
//!
//! let group = BenchGroup::new("Rust minimal http server")
//!     .case(
//!         BenchCase::native("native", launch.clone())
//!             .load(load.clone())
//!             .warmup(Warmup::requests(1000))
//!             .build()?,
//!     )
//!     .case(
//!         BenchCase::kvmserver("kvmserver threads=1", launch, KvmServerOptions::new().allow_all())
//!             .load(load)
//!             .build()?,
//!     );
//!
//! let runner = BenchRunner::new(Arc::new(Oha::locate(None)?));
//! let outcome = group.run(&runner, &[]).await;
//! println!("{}", outcome.report());
//! # Ok(())
//! # }
//! ```

mod case;
mod group;
mod loadgen;
mod locate;
mod process;
pub mod report;
mod runner;
mod watcher;

pub use case::{BenchCase, BenchCaseBuilder};
pub use group::{BenchGroup, CaseFailure, FailurePolicy, GroupOutcome};
pub use loadgen::{LoadGenerator, Oha, run_checked};
pub use locate::find_binary;
pub use process::{Artifacts, ProcessTimeouts, ServerProcess};
pub use report::{ChartOptions, Report};
pub use runner::BenchRunner;
pub use watcher::{ReadySignal, decode_latin1, echo_lines, watch_lines};

pub use kvmbench_core::{Error, NamedResult, Result};
