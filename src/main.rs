use std::path::PathBuf;

use clap::{Parser, Subcommand};
use smkconv::config::Config;
use smkconv::error::Result;
use smkconv::orchestrator::{Mode, Orchestrator};
use smkconv::output::{Format, Reporter};

fn long_version() -> String {
    match smkconv::build_info::git_sha() {
        Some(sha) => format!("{} ({sha})", env!("CARGO_PKG_VERSION")),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[derive(Parser)]
#[command(
    name = "smkconv",
    version,
    long_version = long_version(),
    about = "Migrate a legacy SMK multilanguage site database to the target platform schema"
)]
struct Cli {
    /// Path to the converter config file
    #[arg(long, global = true, default_value = "smkconv.yaml")]
    config: PathBuf,
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    format: Format,
    /// Record every mutating statement instead of executing it
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the legacy tables into the target-prefixed schema
    Prepare,
    /// Convert language attributes into language tags and translation groups
    Convert,
    /// Drop the legacy language columns from the converted tables
    Cleanup,
}

fn main() {
    let cli = Cli::parse();
    let format = cli.format;
    if let Err(e) = run(cli) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            Format::Pretty => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let reporter = Reporter::new(cli.format);
    let config = Config::load(&cli.config)?;
    let mode = match cli.command {
        Commands::Prepare => Mode::Prepare,
        Commands::Convert => Mode::Convert,
        Commands::Cleanup => Mode::Cleanup,
    };
    let summary = Orchestrator::new(config, cli.dry_run, reporter).run(mode)?;
    reporter.summary(&summary)
}
