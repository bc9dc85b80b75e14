//! Spanform CLI
//!
//! Command-line interface for running the Spanform normalization pipeline
//! offline: feed it a JSON wire batch and get normalized records back as
//! NDJSON, or inspect the built-in rule sets.
//!
//! # Usage
//!
//! ```bash
//! spanform --help
//! spanform rulesets
//! spanform normalize batch.json
//! spanform normalize batch.json --rulesets custom-rulesets.json
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipeline::config::PipelineConfig;
use pipeline::ingest::wire::WireBatch;
use pipeline::metrics::PipelineMetrics;
use pipeline::Pipeline;
use std::path::PathBuf;

/// Spanform CLI - GenAI telemetry normalization
#[derive(Parser)]
#[command(name = "spanform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a JSON wire batch and print the records as NDJSON
    Normalize {
        /// Path to the wire batch file
        file: PathBuf,

        /// Optional pipeline configuration file replacing the built-in rule sets
        #[arg(long, env = "SPANFORM_RULESET_FILE")]
        rulesets: Option<PathBuf>,
    },
    /// List the configured rule sets in priority order
    Rulesets {
        /// Optional pipeline configuration file replacing the built-in rule sets
        #[arg(long, env = "SPANFORM_RULESET_FILE")]
        rulesets: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Normalize { file, rulesets }) => normalize(&file, rulesets.as_deref()),
        Some(Commands::Rulesets { rulesets }) => list_rulesets(rulesets.as_deref()),
        None => {
            println!("Spanform CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn load_config(rulesets: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match rulesets {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load rule sets from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn normalize(file: &std::path::Path, rulesets: Option<&std::path::Path>) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read batch file {}", file.display()))?;
    let batch: WireBatch = serde_json::from_str(&contents).context("failed to parse wire batch")?;

    let pipeline = Pipeline::new(load_config(rulesets)?, PipelineMetrics::new_shared())?;
    let normalized = pipeline.normalize_batch(&batch);

    for record in &normalized.records {
        println!("{}", serde_json::to_string(&record.record)?);
    }

    for quarantine in &normalized.quarantined {
        tracing::warn!(
            index = quarantine.index,
            error = %quarantine.error,
            "Record quarantined"
        );
    }
    for (index, warning) in &normalized.warnings {
        tracing::warn!(index, %warning, "Cast warning");
    }

    eprintln!(
        "normalized {} of {} records ({} quarantined, {} cast warnings)",
        normalized.records.len(),
        batch.len(),
        normalized.quarantined.len(),
        normalized.warnings.len()
    );

    Ok(())
}

fn list_rulesets(rulesets: Option<&std::path::Path>) -> Result<()> {
    let config = load_config(rulesets)?;

    let mut sets = config.rulesets;
    sets.sort_by_key(|set| set.priority);

    for set in &sets {
        println!(
            "{:>4}  {:<20} {} rules, triggers: {}",
            set.priority,
            set.name,
            set.rules.len(),
            set.triggers.join(", ")
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        // Verify CLI can parse without arguments
        let cli = Cli::try_parse_from(["spanform"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_normalize_command() {
        let cli = Cli::try_parse_from(["spanform", "normalize", "batch.json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Normalize { .. })));
    }

    #[test]
    fn test_cli_rulesets_command() {
        let cli = Cli::try_parse_from(["spanform", "rulesets"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Rulesets { .. })));
    }

    #[test]
    fn test_list_builtin_rulesets() {
        assert!(list_rulesets(None).is_ok());
    }
}
