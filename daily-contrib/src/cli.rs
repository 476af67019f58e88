/// # daily-contrib CLI Interface (Module)
///
/// Command parsing and user-visible output for `daily-contrib`. The pipeline
/// itself lives in [`daily-contrib-core`]; this module wires config, catalog and
/// git backend together and turns the run report into a line on stdout.
///
/// ## Subcommands
/// - `run`: one generate-and-publish run for today (or `--date`).
/// - `status`: list the artifacts already present for a day. Read-only.
/// - `categories`: print the category names the catalog knows.
/// - `preview`: render a document to stdout without touching disk or git.
///
/// ## Output
/// Results go to stdout, logs go to stderr. A `run` whose outcome is
/// `Failed` returns an error so the binary exits non-zero.
///
/// [`daily-contrib-core`]: ../../daily-contrib-core/
use crate::load_config::load_config;
use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use daily_contrib_core::catalog::{BuiltinCatalog, Category};
use daily_contrib_core::config::DateConvention;
use daily_contrib_core::contract::ContentCatalog;
use daily_contrib_core::contribute::{contribute, RunOptions};
use daily_contrib_core::gate::artifacts_for_date;
use daily_contrib_core::git::GitBackend;
use std::path::PathBuf;

/// CLI for daily-contrib: write one dated contribution per day and publish it.
#[derive(Parser)]
#[clap(
    name = "daily-contrib",
    version,
    about = "Generate one dated document per day and commit and push it, idempotently"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate today's contribution if missing, then commit and push it
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Contribution day as YYYY-MM-DD (defaults to today per the config's date convention)
        #[clap(long)]
        date: Option<NaiveDate>,
        /// Use this category instead of a random draw
        #[clap(long)]
        category: Option<Category>,
        /// Resolve and report without writing the artifact or calling git
        #[clap(long)]
        dry_run: bool,
        /// Print the full run report as JSON instead of a summary line
        #[clap(long)]
        json: bool,
    },
    /// List the artifacts already stored for a day
    Status {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Day to inspect as YYYY-MM-DD (defaults to today)
        #[clap(long)]
        date: Option<NaiveDate>,
    },
    /// Print every known category
    Categories,
    /// Render a document for a category without writing it
    Preview {
        #[clap(long)]
        category: Category,
        /// Date printed in the document (defaults to today, UTC)
        #[clap(long)]
        date: Option<NaiveDate>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run {
            config,
            date,
            category,
            dry_run,
            json,
        } => {
            let config = load_config(config)?;
            let date = date.unwrap_or_else(|| config.pipeline.date_convention.today());
            tracing::info!(command = "run", %date, dry_run, "Starting daily contribution");

            let catalog = BuiltinCatalog::new(date);
            let backend = GitBackend::new(config.repository.clone());
            let options = RunOptions {
                date,
                category,
                dry_run,
            };
            let report = contribute(&config.pipeline, &catalog, &backend, &options).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            if report.outcome.is_success() {
                tracing::info!(command = "run", outcome = %report.outcome.summary(), "Run finished");
                if !json {
                    println!("{}", report.outcome.summary());
                }
                Ok(())
            } else {
                tracing::error!(command = "run", outcome = %report.outcome.summary(), "Run failed");
                Err(anyhow::Error::msg(report.outcome.summary()))
            }
        }
        Commands::Status { config, date } => {
            let config = load_config(config)?;
            let date = date.unwrap_or_else(|| config.pipeline.date_convention.today());
            let found = artifacts_for_date(&config.pipeline.storage_root, date)
                .map_err(|e| anyhow::Error::msg(format!("Status failed: {e}")))?;
            tracing::info!(command = "status", %date, count = found.len(), "Listed artifacts");
            if found.is_empty() {
                println!("no contribution for {date}");
            }
            for path in found {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Categories => {
            for category in Category::ALL {
                println!("{category}");
            }
            Ok(())
        }
        Commands::Preview { category, date } => {
            let date = date.unwrap_or_else(|| DateConvention::Utc.today());
            let body = BuiltinCatalog::new(date)
                .produce(category)
                .map_err(|e| anyhow::Error::msg(format!("Preview failed: {e}")))?;
            print!("{body}");
            Ok(())
        }
    }
}
