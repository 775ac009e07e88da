//! Node discovery.
//!
//! Lists cluster members once through `_nodes` and derives the management
//! endpoint of each from its bound HTTP address.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::client::{ClusterApi, NodeEntry};
use crate::error::{RestartError, Result};

/// Scheme prefixed to every derived management endpoint.
pub const MANAGEMENT_SCHEME: &str = "http://";

/// A cluster member to restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Node name as reported by the cluster.
    pub name: String,
    /// Base URL of the node's own management API.
    pub management_endpoint: String,
    /// Host the node process runs on, used for remote start.
    pub hostname: String,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.hostname)
    }
}

impl TryFrom<NodeEntry> for Node {
    type Error = RestartError;

    fn try_from(entry: NodeEntry) -> Result<Self> {
        let address = entry.http_address.as_deref().ok_or_else(|| {
            RestartError::InvalidAddress(format!("node {} has no http_address", entry.name))
        })?;

        Ok(Self {
            management_endpoint: parse_http_address(address)?,
            name: entry.name,
            hostname: entry.host,
        })
    }
}

/// Turn a bound address such as `inet[/10.0.0.1:9200]` or
/// `node-1/10.0.0.1:9200` into `http://10.0.0.1:9200`.
pub fn parse_http_address(address: &str) -> Result<String> {
    let host_port = address
        .split('/')
        .nth(1)
        .ok_or_else(|| RestartError::InvalidAddress(address.to_string()))?
        .replace(']', "");

    if host_port.is_empty() {
        return Err(RestartError::InvalidAddress(address.to_string()));
    }

    Ok(format!("{}{}", MANAGEMENT_SCHEME, host_port))
}

/// Query the cluster for its members, in the order the cluster lists them.
pub async fn discover_nodes(api: &dyn ClusterApi, cluster_endpoint: &str) -> Result<Vec<Node>> {
    let entries = api.nodes(cluster_endpoint).await?;

    let nodes = entries
        .into_iter()
        .map(Node::try_from)
        .collect::<Result<Vec<_>>>()?;

    if nodes.is_empty() {
        return Err(RestartError::NoNodes(cluster_endpoint.to_string()));
    }

    for node in &nodes {
        debug!(
            node = %node.name,
            host = %node.hostname,
            endpoint = %node.management_endpoint,
            "Discovered node"
        );
    }
    info!(count = nodes.len(), cluster = %cluster_endpoint, "Discovered cluster nodes");

    Ok(nodes)
}
