//! Benchmark case definitions.

use kvmbench_core::{
    Error, KvmServerOptions, LaunchSpec, LoadTestArgs, ReadyPattern, Result, Warmup,
};
use std::path::PathBuf;

/// One candidate server and how to measure it. Immutable once built.
#[derive(Debug, Clone)]
pub struct BenchCase {
    name: String,
    launch: LaunchSpec,
    kvmserver: Option<KvmServerOptions>,
    ready: ReadyPattern,
    warmup: Option<Warmup>,
    load: LoadTestArgs,
    tolerate: Vec<String>,
    artifacts: Vec<PathBuf>,
}

impl BenchCase {
    /// A candidate started directly. Defaults to waiting for a stderr line
    /// starting with `Listening`.
    pub fn native(name: impl Into<String>, launch: LaunchSpec) -> BenchCaseBuilder {
        BenchCaseBuilder::new(name.into(), launch, None, ReadyPattern::stderr_prefix("Listening"))
    }

    /// A candidate run as a kvmserver guest. Waits for kvmserver's `Program`
    /// line on stdout.
    pub fn kvmserver(
        name: impl Into<String>,
        launch: LaunchSpec,
        options: KvmServerOptions,
    ) -> BenchCaseBuilder {
        BenchCaseBuilder::new(name.into(), launch, Some(options), ReadyPattern::kvmserver())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn launch(&self) -> &LaunchSpec {
        &self.launch
    }

    pub fn kvmserver_options(&self) -> Option<&KvmServerOptions> {
        self.kvmserver.as_ref()
    }

    pub fn ready(&self) -> &ReadyPattern {
        &self.ready
    }

    pub fn warmup(&self) -> Option<&Warmup> {
        self.warmup.as_ref()
    }

    pub fn load(&self) -> &LoadTestArgs {
        &self.load
    }

    /// Error labels tolerated during measurement.
    pub fn tolerate(&self) -> &[String] {
        &self.tolerate
    }

    /// Paths removed when the case ends. Includes the load target's UNIX
    /// socket, if any.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// True if the filter list is empty or any filter is a substring of the
    /// case name.
    pub fn matches(&self, filters: &[String]) -> bool {
        filters.is_empty() || filters.iter().any(|f| self.name.contains(f.as_str()))
    }
}

/// Builder for [`BenchCase`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct BenchCaseBuilder {
    case: BenchCase,
}

impl BenchCaseBuilder {
    fn new(
        name: String,
        launch: LaunchSpec,
        kvmserver: Option<KvmServerOptions>,
        ready: ReadyPattern,
    ) -> Self {
        Self {
            case: BenchCase {
                name,
                launch,
                kvmserver,
                ready,
                warmup: None,
                load: LoadTestArgs::default(),
                tolerate: Vec::new(),
                artifacts: Vec::new(),
            },
        }
    }

    pub fn ready(mut self, ready: ReadyPattern) -> Self {
        self.case.ready = ready;
        self
    }

    pub fn warmup(mut self, warmup: Warmup) -> Self {
        self.case.warmup = Some(warmup);
        self
    }

    pub fn load(mut self, load: LoadTestArgs) -> Self {
        self.case.load = load;
        self
    }

    pub fn tolerate(mut self, label: impl Into<String>) -> Self {
        self.case.tolerate.push(label.into());
        self
    }

    pub fn artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.case.artifacts.push(path.into());
        self
    }

    pub fn build(self) -> Result<BenchCase> {
        let mut case = self.case;

        if case.name.trim().is_empty() {
            return Err(Error::InvalidConfig("case name cannot be empty".to_string()));
        }
        case.launch.validate()?;
        if let Some(options) = &case.kvmserver {
            options.validate()?;
        }
        if case.ready.needle().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "case '{}': readiness pattern cannot be empty",
                case.name
            )));
        }
        case.load.validate()?;
        if let Some(warmup) = &case.warmup {
            warmup.load_args(&case.load).validate()?;
        }

        if let Some(socket) = case.load.target.socket_path() {
            if !case.artifacts.iter().any(|p| p == socket) {
                case.artifacts.push(socket.clone());
            }
        }

        Ok(case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmbench_core::{OutputStream, Target};

    #[test]
    fn native_defaults_to_listening_on_stderr() {
        let case = BenchCase::native("native", LaunchSpec::new("./httpserver"))
            .build()
            .unwrap();
        assert_eq!(case.ready().stream, OutputStream::Stderr);
        assert_eq!(case.ready().needle(), "Listening");
        assert!(case.kvmserver_options().is_none());
    }

    #[test]
    fn kvmserver_defaults_to_program_on_stdout() {
        let case = BenchCase::kvmserver(
            "kvmserver threads=1",
            LaunchSpec::new("./httpserver"),
            KvmServerOptions::new().allow_all(),
        )
        .build()
        .unwrap();
        assert_eq!(case.ready().stream, OutputStream::Stdout);
        assert_eq!(case.ready().needle(), "Program");
        assert!(case.kvmserver_options().unwrap().allow_all);
    }

    #[test]
    fn unix_socket_target_becomes_artifact() {
        let case = BenchCase::native("native", LaunchSpec::new("./httpserver"))
            .load(LoadTestArgs::new(Target::unix("./bench.sock")))
            .artifact("./bench.sock")
            .artifact("./other.tmp")
            .build()
            .unwrap();
        assert_eq!(
            case.artifacts(),
            &[PathBuf::from("./bench.sock"), PathBuf::from("./other.tmp")]
        );
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = BenchCase::native(" ", LaunchSpec::new("./httpserver"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn invalid_kvmserver_options_are_rejected() {
        let result = BenchCase::kvmserver(
            "bad",
            LaunchSpec::new("./httpserver"),
            KvmServerOptions::new().threads(0),
        )
        .build();
        assert!(result.is_err());
    }

    #[test]
    fn invalid_warmup_is_rejected() {
        let result = BenchCase::native("native", LaunchSpec::new("./httpserver"))
            .warmup(Warmup::requests(0))
            .build();
        assert!(result.is_err());
    }

    mod filters {
        use super::*;

        fn case(name: &str) -> BenchCase {
            BenchCase::native(name, LaunchSpec::new("true")).build().unwrap()
        }

        #[test]
        fn empty_filter_matches_everything() {
            assert!(case("native").matches(&[]));
        }

        #[test]
        fn substring_matches() {
            let filters = vec!["ephemeral".to_string()];
            assert!(case("kvmserver ephemeral threads=2").matches(&filters));
            assert!(!case("kvmserver threads=1").matches(&filters));
        }

        #[test]
        fn any_filter_suffices() {
            let filters = vec!["nomatch".to_string(), "native".to_string()];
            assert!(case("native (reusing connection)").matches(&filters));
        }
    }
}
