pub mod error;
pub mod launch;
pub mod load;
pub mod ready;
pub mod results;

pub use error::{Error, Result};
pub use launch::{CommandLine, KvmServerOptions, LINE_BUFFER_SHIM, LaunchSpec};
pub use load::{DEADLINE_ABORT, DEFAULT_URL, LoadTestArgs, StopCondition, Target, Warmup};
pub use ready::{LineMatch, OutputStream, ReadyPattern};
pub use results::{Details, LoadTestResult, NamedResult, Percentiles, RpsStats, Summary, Timing};
