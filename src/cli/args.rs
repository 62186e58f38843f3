//! Command line argument parsing for the NutriGuard CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// NutriGuard - health-aware food product evaluation
#[derive(Parser, Debug, Clone)]
#[command(name = "nutriguard")]
#[command(about = "Evaluate food products against personal health profiles")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct NutriGuardArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl NutriGuardArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Output format for command results.
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// JSON
    Json,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Evaluate one product for one user
    Evaluate(EvaluateArgs),

    /// Retrieve substitute candidates without scoring
    Retrieve(RetrieveArgs),

    /// Show catalog statistics
    Stats(StatsArgs),
}

/// Arguments for a full pipeline evaluation
#[derive(Parser, Debug, Clone)]
pub struct EvaluateArgs {
    /// Catalog file (JSON array of product records)
    #[arg(short, long, value_name = "CATALOG_FILE")]
    pub catalog: PathBuf,

    /// Health profile file (JSON object, or a map of user id to profile)
    #[arg(short, long, value_name = "PROFILE_FILE")]
    pub profile: PathBuf,

    /// Product id the user clicked
    #[arg(long, value_name = "PRODUCT_ID")]
    pub product: u64,

    /// User id to evaluate for
    #[arg(short, long, default_value = "default")]
    pub user: String,

    /// Number of substitute candidates to retrieve
    #[arg(short, default_value = "5")]
    pub k: usize,

    /// Canned allergen analysis text (file) used instead of a generation backend
    #[arg(long, value_name = "REPORT_FILE")]
    pub allergen_report: Option<PathBuf>,
}

/// Arguments for candidate retrieval
#[derive(Parser, Debug, Clone)]
pub struct RetrieveArgs {
    /// Catalog file (JSON array of product records)
    #[arg(short, long, value_name = "CATALOG_FILE")]
    pub catalog: PathBuf,

    /// Product id the user clicked
    #[arg(long, value_name = "PRODUCT_ID")]
    pub product: u64,

    /// Number of candidates to retrieve
    #[arg(short, default_value = "5")]
    pub k: usize,
}

/// Arguments for catalog statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Catalog file (JSON array of product records)
    #[arg(short, long, value_name = "CATALOG_FILE")]
    pub catalog: PathBuf,
}
