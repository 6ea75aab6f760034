use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tunesort::config::AppConfig;
use tunesort::context::{BatchOutcome, RunContext};
use tunesort::fs::LocalFs;
use tunesort::metadata::lofty_source::LoftyExtractor;
use tunesort::report::LogReporter;

#[derive(Parser)]
#[command(name = "tunesort", version, about = "Tag-driven audio library organizer")]
struct Cli {
    /// Path to a config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report what would change without touching the filesystem
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move audio files into <destination>/<Artist>/<Artist> - <Title>.<ext>
    Resort {
        source: PathBuf,
        destination: PathBuf,
    },

    /// Rename files whose extension does not match their audio format
    FixExtensions { source: PathBuf },

    /// Remove duplicate recordings, keeping the best copy of each
    Deduplicate { source: PathBuf },

    /// Delete files that are too small or fail integrity checks
    Clean { source: PathBuf },

    /// Remove empty directories, deepest first
    CleanEmptyDirs { source: PathBuf },

    /// Run every step: resort (if a destination is given), fix-extensions,
    /// deduplicate, clean, clean-empty-dirs
    All {
        source: PathBuf,
        destination: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let fs = LocalFs;
    let extractor = LoftyExtractor;
    let reporter = LogReporter::new();
    let ctx = RunContext::new(&config, &fs, &extractor, &reporter, cli.dry_run);

    match cli.command {
        Commands::Resort { source, destination } => {
            let outcome = tunesort::resort::resort(&ctx, &source, &destination)
                .context("Resort failed")?;
            summarize("Resort", &outcome);
        }

        Commands::FixExtensions { source } => {
            let outcome = tunesort::fix_ext::fix_extensions(&ctx, &source)
                .context("Extension repair failed")?;
            summarize("Extension repair", &outcome);
        }

        Commands::Deduplicate { source } => {
            let report = tunesort::dedupe::deduplicate(&ctx, &source)
                .context("Deduplication failed")?;
            summarize("Deduplication", &report.outcome);
            if !report.collisions.is_empty() {
                println!("{} name collisions left for review", report.collisions.len());
            }
        }

        Commands::Clean { source } => {
            let outcome = tunesort::clean::clean(&ctx, &source).context("Cleanup failed")?;
            summarize("Cleanup", &outcome);
        }

        Commands::CleanEmptyDirs { source } => {
            let outcome = tunesort::clean::clean_empty_dirs(&ctx, &source)
                .context("Empty directory cleanup failed")?;
            summarize("Empty directory cleanup", &outcome);
        }

        Commands::All { source, destination } => {
            let steps = tunesort::pipeline::run_all(&ctx, &source, destination.as_deref())
                .context("Run aborted")?;
            for (task, outcome) in &steps {
                summarize(task.title(), outcome);
            }
        }
    }

    Ok(())
}

fn summarize(label: &str, outcome: &BatchOutcome) {
    println!(
        "{} complete: {} processed, {} errors, {} removed, {} renamed",
        label, outcome.processed, outcome.errors, outcome.removed, outcome.renamed
    );
}
