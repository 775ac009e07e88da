//! Command-line interface for rolling-restart.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RestartConfig;

/// Zero-downtime rolling restart of an Elasticsearch-style cluster.
#[derive(Parser, Debug)]
#[command(name = "rolling-restart")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ROLLING_RESTART_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Cluster entry URL (overrides the configuration file)
    #[arg(short = 'u', long, global = true)]
    pub cluster_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Restart every node of the cluster, one at a time
    Restart {
        /// Check the cluster and print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List the nodes that would be restarted
    Nodes,

    /// Show cluster health
    Health,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply flag overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut RestartConfig) {
        if let Some(ref url) = self.cluster_url {
            config.cluster_url = url.clone();
        }
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }
        if self.json_logs {
            config.json_logs = true;
        }
    }
}
