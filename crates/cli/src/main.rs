mod commands;
mod suite;

use clap::{Parser, Subcommand};
use commands::{list::ListArgs, run::RunArgs, version::VersionArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kvmbench")]
#[command(about = "Benchmark HTTP servers natively and inside kvmserver microVMs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark suite and write target/bench.md and target/bench.svg
    Run(RunArgs),

    /// List the cases a suite would run
    List(ListArgs),

    /// Show version information
    Version(VersionArgs),
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout carries only the Markdown report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::List(args) => commands::list::run(args),
        Commands::Version(args) => {
            commands::version::run(args);
            Ok(())
        }
    }
}
