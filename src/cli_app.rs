//! atriage CLI: argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use attachment_triage::core::config::Config;
use attachment_triage::core::errors::Result;
use attachment_triage::registry::snapshot::SnapshotRegistry;
use attachment_triage::triage::engine::{RunOutcome, TriageEngine};

/// Attachment triage pipeline for a digital-asset registry.
#[derive(Debug, Parser)]
#[command(name = "atriage", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan, quarantine, and clean attachments from a registry snapshot.
    Run {
        /// Registry snapshot manifest (JSON) to triage against.
        #[arg(long, value_name = "PATH")]
        manifest: PathBuf,
    },
    /// Validate the configuration and print the effective values.
    CheckConfig,
}

/// Dispatch a parsed command line; returns the process exit code.
pub fn run(cli: &Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Run { manifest } => {
            let registry = SnapshotRegistry::load(manifest)?;
            println!(
                "{} signature={:?} window={} suffixes={:?}",
                "Searching for infected files...".bold(),
                config.scan.signature,
                config.scan.calendar_window_offset,
                config.scan.suffixes
            );

            let mut engine = TriageEngine::new(&registry, config)?;
            let report = engine.run()?;

            if report.metrics.infected > 0 {
                println!(
                    "{}",
                    format!("{} infected attachment(s) quarantined", report.metrics.infected)
                        .red()
                        .bold()
                );
            }
            match report.outcome {
                RunOutcome::Completed => {
                    println!("{}", "Run complete.".green());
                    Ok(0)
                }
                RunOutcome::AbortedStorageFull => {
                    eprintln!("{}", "Run aborted: storage device out of space.".red().bold());
                    Ok(2)
                }
            }
        }
        Command::CheckConfig => {
            let rendered =
                toml::to_string_pretty(&config).map_err(|error| {
                    attachment_triage::core::errors::TriageError::Serialization {
                        context: "toml",
                        details: error.to_string(),
                    }
                })?;
            println!("{rendered}");
            println!("{}", "Configuration OK.".green());
            Ok(0)
        }
    }
}
