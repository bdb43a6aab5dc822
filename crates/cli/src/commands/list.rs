//! The `list` command - shows the cases a suite would run.

use crate::suite::Suite;
use clap::Args;
use kvmbench::BenchCase;
use std::path::PathBuf;

#[derive(Args)]
pub struct ListArgs {
    /// Path to the suite file
    #[arg(long, short)]
    config: PathBuf,

    /// Only list cases whose name contains this string (repeatable)
    #[arg(long, short)]
    filter: Vec<String>,
}

pub fn run(args: ListArgs) -> anyhow::Result<()> {
    let suite = Suite::load(&args.config)?;
    let settings = suite.settings(None);

    for group in suite.groups(&settings)? {
        let cases: Vec<&BenchCase> = group.selected(&args.filter).collect();
        if cases.is_empty() {
            continue;
        }
        println!("{}", group.title());
        for case in cases {
            println!("  {:<48} {}", case.name(), describe(case));
        }
        println!();
    }

    Ok(())
}

fn describe(case: &BenchCase) -> String {
    match case.kvmserver_options() {
        Some(options) => {
            let flags = options.flags();
            if flags.is_empty() {
                "kvmserver".to_string()
            } else {
                format!("kvmserver {}", flags.join(" "))
            }
        }
        None => "native".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmbench_core::{KvmServerOptions, LaunchSpec};

    #[test]
    fn describes_launch_mode() {
        let native = BenchCase::native("native", LaunchSpec::new("./server")).build().unwrap();
        assert_eq!(describe(&native), "native");

        let vm = BenchCase::kvmserver(
            "kvmserver ephemeral",
            LaunchSpec::new("./server"),
            KvmServerOptions::new().threads(2).ephemeral(),
        )
        .build()
        .unwrap();
        assert_eq!(describe(&vm), "kvmserver --threads 2 --ephemeral");
    }
}
