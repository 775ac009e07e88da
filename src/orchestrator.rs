//! Rolling restart workflow.
//!
//! ```text
//! precheck (cluster green) -> discover nodes -> baseline node count
//!   for each node, strictly in discovery order:
//!     a. node green
//!     b. disable shard allocation
//!     c. shutdown
//!     d. start over ssh after the settle delay
//!     e. number_of_nodes == baseline
//!     f. enable shard allocation
//!     g. node green (long bound)
//! ```
//!
//! The first failing step ends the run with [`RestartError::NodeStep`].
//! Nothing is rolled back: if a node fails between b and f, shard
//! allocation stays disabled and the remaining nodes are left untouched.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument};

use crate::allocation::{set_shard_allocation, ShardAllocation};
use crate::client::ClusterApi;
use crate::config::RestartConfig;
use crate::discovery::{discover_nodes, Node};
use crate::error::{RestartError, Result};
use crate::poller::wait_for_state;
use crate::remote::{RemoteExecutor, RemoteProcessController, StartCommand};

/// Field and value polled for cluster health.
const STATUS_FIELD: &str = "status";
const GREEN: &str = "green";
/// Field polled for rejoin.
const NODE_COUNT_FIELD: &str = "number_of_nodes";

/// One step of the per-node restart sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartStep {
    AwaitReady,
    DisableAllocation,
    Shutdown,
    Start,
    AwaitRejoin,
    EnableAllocation,
    AwaitInitialized,
}

impl RestartStep {
    /// The per-node sequence, in execution order.
    pub const SEQUENCE: [RestartStep; 7] = [
        RestartStep::AwaitReady,
        RestartStep::DisableAllocation,
        RestartStep::Shutdown,
        RestartStep::Start,
        RestartStep::AwaitRejoin,
        RestartStep::EnableAllocation,
        RestartStep::AwaitInitialized,
    ];
}

impl fmt::Display for RestartStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RestartStep::AwaitReady => "waiting for node to be green",
            RestartStep::DisableAllocation => "disabling shard allocation",
            RestartStep::Shutdown => "shutting down node",
            RestartStep::Start => "starting node",
            RestartStep::AwaitRejoin => "waiting for node to rejoin the cluster",
            RestartStep::EnableAllocation => "enabling shard allocation",
            RestartStep::AwaitInitialized => "waiting for node to initialize",
        };
        f.write_str(text)
    }
}

/// Run state fixed before the first node is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartContext {
    nodes: Vec<Node>,
    baseline_node_count: u64,
}

impl RestartContext {
    pub fn new(nodes: Vec<Node>, baseline_node_count: u64) -> Self {
        Self {
            nodes,
            baseline_node_count,
        }
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Cluster size observed before any restart.
    pub fn baseline_node_count(&self) -> u64 {
        self.baseline_node_count
    }

    fn expected_node_count(&self) -> Value {
        json!(self.baseline_node_count)
    }
}

/// Outcome of one node restart.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: Node,
    pub elapsed: Duration,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    pub baseline_node_count: u64,
    pub nodes: Vec<NodeReport>,
    pub elapsed: Duration,
}

/// Serial rolling restart driver.
pub struct RollingRestart<'a> {
    api: &'a dyn ClusterApi,
    config: &'a RestartConfig,
    processes: RemoteProcessController<'a>,
}

impl<'a> RollingRestart<'a> {
    pub fn new(
        api: &'a dyn ClusterApi,
        executor: &'a dyn RemoteExecutor,
        config: &'a RestartConfig,
    ) -> Self {
        Self {
            api,
            config,
            processes: RemoteProcessController::new(api, executor, config),
        }
    }

    /// Restart every node of the cluster, one at a time.
    pub async fn run(&self) -> Result<RestartReport> {
        let started = Instant::now();
        let context = self.prepare().await?;

        let mut nodes = Vec::with_capacity(context.nodes().len());
        for node in context.nodes() {
            nodes.push(self.restart_node(&context, node).await?);
        }

        info!(nodes = nodes.len(), "Cluster restart complete");
        Ok(RestartReport {
            baseline_node_count: context.baseline_node_count(),
            nodes,
            elapsed: started.elapsed(),
        })
    }

    /// Check the cluster is green, discover its nodes and record the
    /// baseline node count.
    pub async fn prepare(&self) -> Result<RestartContext> {
        let cluster_url = self.config.cluster_url.as_str();

        info!(cluster = %cluster_url, "Ensuring cluster is green");
        wait_for_state(
            self.api,
            cluster_url,
            &self.config.retry.precheck,
            STATUS_FIELD,
            &json!(GREEN),
        )
        .await?;

        info!(cluster = %cluster_url, "Finding nodes in cluster");
        let nodes = discover_nodes(self.api, cluster_url).await?;

        let snapshot = self.api.health(cluster_url).await?;
        let baseline = snapshot.number_of_nodes().ok_or_else(|| {
            RestartError::InvalidSnapshot(format!(
                "{} is missing or not a count: {}",
                NODE_COUNT_FIELD,
                snapshot.get(NODE_COUNT_FIELD).cloned().unwrap_or(Value::Null)
            ))
        })?;
        info!(baseline, nodes = nodes.len(), "Recorded baseline node count");

        Ok(RestartContext::new(nodes, baseline))
    }

    /// Drive one node through the full restart sequence.
    pub async fn restart_node(&self, context: &RestartContext, node: &Node) -> Result<NodeReport> {
        let started = Instant::now();
        let endpoint = node.management_endpoint.as_str();
        let retry = &self.config.retry;
        let span = info_span!("node", name = %node.name, host = %node.hostname);
        let green = json!(GREEN);

        async {
            info!("Working on node");

            run_step(node, RestartStep::AwaitReady, async {
                wait_for_state(self.api, endpoint, &retry.node_ready, STATUS_FIELD, &green).await
            })
            .await?;

            run_step(node, RestartStep::DisableAllocation, async {
                set_shard_allocation(self.api, endpoint, ShardAllocation::Disable).await
            })
            .await?;

            run_step(node, RestartStep::Shutdown, self.processes.shutdown_node(endpoint)).await?;

            run_step(
                node,
                RestartStep::Start,
                self.processes.start_node(&node.hostname, self.config.start_delay),
            )
            .await?;

            run_step(node, RestartStep::AwaitRejoin, async {
                wait_for_state(
                    self.api,
                    endpoint,
                    &retry.rejoin,
                    NODE_COUNT_FIELD,
                    &context.expected_node_count(),
                )
                .await
            })
            .await?;

            run_step(node, RestartStep::EnableAllocation, async {
                set_shard_allocation(self.api, endpoint, ShardAllocation::Enable).await
            })
            .await?;

            run_step(node, RestartStep::AwaitInitialized, async {
                wait_for_state(self.api, endpoint, &retry.initialize, STATUS_FIELD, &green).await
            })
            .await?;

            let elapsed = started.elapsed();
            info!(elapsed_ms = elapsed.as_millis() as u64, "Node restart a success");
            Ok::<_, RestartError>(NodeReport {
                node: node.clone(),
                elapsed,
            })
        }
        .instrument(span)
        .await
    }

    /// Describe what [`restart_node`](Self::restart_node) would do, without
    /// doing it.
    pub fn plan(&self, context: &RestartContext, node: &Node) -> Vec<(RestartStep, String)> {
        let endpoint = &node.management_endpoint;
        let retry = &self.config.retry;

        RestartStep::SEQUENCE
            .iter()
            .map(|&step| {
                let detail = match step {
                    RestartStep::AwaitReady => format!(
                        "poll {} until status == green (up to {} attempts)",
                        endpoint, retry.node_ready.max_attempts
                    ),
                    RestartStep::DisableAllocation => format!(
                        "PUT {}/_cluster/settings allocation.enable=none",
                        endpoint
                    ),
                    RestartStep::Shutdown => {
                        format!("POST {}/_cluster/nodes/_local/_shutdown", endpoint)
                    }
                    RestartStep::Start => format!(
                        "ssh {}@{}: {}",
                        self.config.ssh_user,
                        node.hostname,
                        StartCommand::from_config(self.config, self.config.start_delay).render()
                    ),
                    RestartStep::AwaitRejoin => format!(
                        "poll {} until number_of_nodes == {} (up to {} attempts)",
                        endpoint,
                        context.baseline_node_count(),
                        retry.rejoin.max_attempts
                    ),
                    RestartStep::EnableAllocation => format!(
                        "PUT {}/_cluster/settings allocation.enable=all",
                        endpoint
                    ),
                    RestartStep::AwaitInitialized => format!(
                        "poll {} until status == green (up to {} attempts)",
                        endpoint, retry.initialize.max_attempts
                    ),
                };
                (step, detail)
            })
            .collect()
    }
}

/// Run one step, tagging any failure with the node and step.
async fn run_step<T>(
    node: &Node,
    step: RestartStep,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    info!(step = %step, "Step started");
    fut.await.map_err(|e| RestartError::NodeStep {
        node: node.name.clone(),
        step,
        source: Box::new(e),
    })
}
