//! Launch configuration for benchmark candidates.
//!
//! A candidate is described by a [`LaunchSpec`] and, when it runs inside the
//! microVM host, a set of [`KvmServerOptions`]. Both turn into a
//! [`CommandLine`] through pure functions so the exact argument vector can be
//! checked without spawning anything.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Shim that forces line-buffered stdout on the wrapped command.
pub const LINE_BUFFER_SHIM: &str = "stdbuf";

/// What to execute for a benchmark candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable path or a name resolved through `PATH`.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory, inherited when unset.
    pub cwd: Option<PathBuf>,
    /// Environment overrides forwarded verbatim.
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(Error::InvalidConfig("program cannot be empty".to_string()));
        }
        if self.env.keys().any(|k| k.is_empty() || k.contains('=')) {
            return Err(Error::InvalidConfig(
                "environment variable names cannot be empty or contain '='".to_string(),
            ));
        }
        Ok(())
    }
}

/// Flags for the kvmserver launcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvmServerOptions {
    /// Number of request VMs (`--threads`).
    pub threads: Option<u32>,
    /// Requests sent by kvmserver before it reports readiness (`--warmup`).
    pub warmup: Option<u32>,
    /// Grant the guest every sandbox permission (`--allow-all`).
    pub allow_all: bool,
    /// Reset guest state after each request (`--ephemeral`).
    pub ephemeral: bool,
}

impl KvmServerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn warmup(mut self, requests: u32) -> Self {
        self.warmup = Some(requests);
        self
    }

    pub fn allow_all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(Error::InvalidConfig(
                "kvmserver threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Launcher flags in the order kvmserver documents them.
    pub fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(threads) = self.threads {
            flags.push("--threads".to_string());
            flags.push(threads.to_string());
        }
        if let Some(warmup) = self.warmup {
            flags.push("--warmup".to_string());
            flags.push(warmup.to_string());
        }
        if self.allow_all {
            flags.push("--allow-all".to_string());
        }
        if self.ephemeral {
            flags.push("--ephemeral".to_string());
        }
        flags
    }
}

/// A fully resolved program and argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Runs the candidate directly.
    pub fn native(launch: &LaunchSpec) -> Self {
        Self {
            program: launch.program.clone(),
            args: launch.args.clone(),
        }
    }

    /// Runs the candidate as a guest of kvmserver behind the line-buffering shim:
    /// `stdbuf --output=L <kvmserver> [flags] -- <program> [args...]`.
    pub fn kvmserver(kvmserver: &Path, options: &KvmServerOptions, launch: &LaunchSpec) -> Self {
        let mut args = vec!["--output=L".to_string(), kvmserver.display().to_string()];
        args.extend(options.flags());
        args.push("--".to_string());
        args.push(launch.program.clone());
        args.extend(launch.args.iter().cloned());

        Self {
            program: LINE_BUFFER_SHIM.to_string(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod launch_spec {
        use super::*;

        #[test]
        fn builder_collects_fields() {
            let spec = LaunchSpec::new("./httpserver")
                .arg("./bench.sock")
                .cwd("/srv")
                .env("DENO_DIR", ".cache/deno");

            assert_eq!(spec.program, "./httpserver");
            assert_eq!(spec.args, vec!["./bench.sock"]);
            assert_eq!(spec.cwd, Some(PathBuf::from("/srv")));
            assert_eq!(spec.env.get("DENO_DIR").map(String::as_str), Some(".cache/deno"));
        }

        #[test]
        fn empty_program_is_rejected() {
            let err = LaunchSpec::new("  ").validate().unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)));
        }

        #[test]
        fn env_key_with_equals_is_rejected() {
            let spec = LaunchSpec::new("deno").env("A=B", "c");
            assert!(spec.validate().is_err());
        }
    }

    mod kvmserver_options {
        use super::*;

        #[test]
        fn default_has_no_flags() {
            assert!(KvmServerOptions::new().flags().is_empty());
        }

        #[test]
        fn flags_follow_fixed_order() {
            let options = KvmServerOptions::new()
                .ephemeral()
                .allow_all()
                .warmup(1000)
                .threads(2);
            assert_eq!(
                options.flags(),
                vec!["--threads", "2", "--warmup", "1000", "--allow-all", "--ephemeral"]
            );
        }

        #[test]
        fn zero_threads_is_rejected() {
            let options = KvmServerOptions::new().threads(0);
            assert!(options.validate().is_err());
        }
    }

    mod command_line {
        use super::*;

        #[test]
        fn native_uses_program_directly() {
            let launch = LaunchSpec::new("./httpserver").arg("./bench.sock");
            let cmd = CommandLine::native(&launch);
            assert_eq!(cmd.program, "./httpserver");
            assert_eq!(cmd.args, vec!["./bench.sock"]);
        }

        #[test]
        fn kvmserver_wraps_with_shim() {
            let launch = LaunchSpec::new("./httpserver").arg("./bench.sock");
            let options = KvmServerOptions::new().allow_all().warmup(1000).ephemeral();
            let cmd = CommandLine::kvmserver(Path::new("/opt/kvmserver"), &options, &launch);

            assert_eq!(cmd.program, "stdbuf");
            assert_eq!(
                cmd.args,
                vec![
                    "--output=L",
                    "/opt/kvmserver",
                    "--warmup",
                    "1000",
                    "--allow-all",
                    "--ephemeral",
                    "--",
                    "./httpserver",
                    "./bench.sock",
                ]
            );
        }

        #[test]
        fn kvmserver_without_flags_still_separates_program() {
            let launch = LaunchSpec::new("deno").args(["run", "--allow-all", "main.ts"]);
            let cmd = CommandLine::kvmserver(
                Path::new("kvmserver"),
                &KvmServerOptions::default(),
                &launch,
            );
            assert_eq!(
                cmd.args,
                vec!["--output=L", "kvmserver", "--", "deno", "run", "--allow-all", "main.ts"]
            );
        }

        #[test]
        fn display_joins_with_spaces() {
            let launch = LaunchSpec::new("node").args(["reused.ts", "8000"]);
            assert_eq!(CommandLine::native(&launch).to_string(), "node reused.ts 8000");
        }
    }
}
