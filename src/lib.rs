//! rolling-restart - zero-downtime rolling restart for Elasticsearch-style
//! search clusters.
//!
//! The tool restarts one node at a time. Before a node goes down the cluster
//! must be green and shard allocation is switched off; after the node rejoins,
//! allocation is switched back on and the tool waits for green again before
//! moving to the next node. The first failure stops the whole run.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  orchestrator: RollingRestart (serial per-node sequence) │
//! ├──────────────┬──────────────┬─────────────┬──────────────┤
//! │  poller      │  discovery   │  allocation │  remote      │
//! │  (backoff)   │              │             │  (ssh)       │
//! ├──────────────┴──────────────┴─────────────┴──────────────┤
//! │  client: ClusterApi / HttpClusterApi                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use rolling_restart::client::HttpClusterApi;
//! use rolling_restart::config::RestartConfig;
//! use rolling_restart::orchestrator::RollingRestart;
//! use rolling_restart::remote::SshExecutor;
//!
//! #[tokio::main]
//! async fn main() -> rolling_restart::Result<()> {
//!     let config = RestartConfig::load(None)?;
//!     let api = HttpClusterApi::new(config.request_timeout)?;
//!     let ssh = SshExecutor::new(config.ssh_user.clone(), config.ssh_port);
//!
//!     let report = RollingRestart::new(&api, &ssh, &config).run().await?;
//!     println!("restarted {} nodes", report.nodes.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

pub mod allocation;
pub mod backoff;
pub mod cli;
pub mod client;
pub mod discovery;
pub mod orchestrator;
pub mod output;
pub mod poller;
pub mod remote;
pub mod telemetry;

pub use error::{RestartError, Result};
