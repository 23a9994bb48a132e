//! Workload Recommender CLI
//!
//! A command-line tool for inspecting the recommendations and savings
//! persisted by the workload recommender.

mod commands;
mod output;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{describe, recommendations, savings};
use std::path::PathBuf;

/// Workload Recommender CLI
#[derive(Parser)]
#[command(name = "wrec")]
#[command(author, version, about = "CLI for Workload Recommender", long_about = None)]
pub struct Cli {
    /// Recommendation store directory (can also be set via WREC_STORE_DIR env var)
    #[arg(long, env = "WREC_STORE_DIR", default_value = "data/recommendations")]
    pub store_dir: PathBuf,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List recommendations per container
    Recommendations {
        #[command(flatten)]
        filter: store::Filter,

        /// Only show workloads with a computed recommendation
        #[arg(long)]
        valid_only: bool,
    },

    /// Show every resource of one workload
    Describe {
        /// Workload (format: namespace/name)
        workload: String,

        /// Workload kind, when several kinds share the name
        #[arg(long, short)]
        kind: Option<String>,
    },

    /// Show estimated monthly savings per workload
    Savings {
        #[command(flatten)]
        filter: store::Filter,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let reader = store::StoreReader::new(&cli.store_dir, cli.verbose);

    match cli.command {
        Commands::Recommendations { filter, valid_only } => {
            recommendations::list_recommendations(&reader, &filter, valid_only, cli.format).await?;
        }
        Commands::Describe { workload, kind } => {
            describe::describe_workload(&reader, &workload, kind.as_deref(), cli.format).await?;
        }
        Commands::Savings { filter } => {
            savings::show_savings(&reader, &filter, cli.format).await?;
        }
    }

    Ok(())
}
