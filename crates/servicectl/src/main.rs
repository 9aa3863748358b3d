//! servicectl: plan ServiceSet rollouts from a YAML snapshot

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "servicectl")]
#[command(about = "Dependency-aware ServiceSet planning")]
#[command(version)]
struct Cli {
    /// Snapshot file path
    #[arg(short, long, global = true, default_value = "serviceset.yaml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of commands printing engine results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human readable table
    Table,
    /// YAML document
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the snapshot, its service dependencies and template chains
    Validate,

    /// Run one reconciliation pass per requester and print the decisions
    Plan {
        /// Only plan requesters targeting this cluster (name or namespace/name)
        #[arg(long)]
        cluster: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: Format,
    },

    /// Print the ServiceSet identity of a requester
    Key {
        /// Target cluster (name or namespace/name), omit for the management cluster
        #[arg(long)]
        cluster: Option<String>,

        /// Multi-cluster service producing the ServiceSet
        #[arg(long)]
        policy: Option<String>,
    },

    /// Show upgrade paths of a cluster's services
    Upgrades {
        /// Target cluster (name or namespace/name)
        #[arg(long)]
        cluster: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: Format,
    },

    /// Show ready/total services per cluster from stored ServiceSets
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    smol::block_on(async {
        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config),
            Commands::Plan { cluster, output } => {
                commands::plan::run(&cli.config, cluster.as_deref(), output).await
            }
            Commands::Key { cluster, policy } => {
                commands::key::run(&cli.config, cluster.as_deref(), policy.as_deref())
            }
            Commands::Upgrades { cluster, output } => {
                commands::upgrades::run(&cli.config, &cluster, output)
            }
            Commands::Status => commands::status::run(&cli.config),
        }
    })
}
