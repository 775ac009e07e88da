//! HTTP client for the cluster management API.
//!
//! [`ClusterApi`] is the seam between the restart workflow and the cluster.
//! [`HttpClusterApi`] is the production implementation over reqwest; tests
//! substitute an in-memory cluster.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{RestartError, Result};

/// Management API calls used during a rolling restart.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// `GET {endpoint}/_nodes`, entries in response order.
    async fn nodes(&self, endpoint: &str) -> Result<Vec<NodeEntry>>;

    /// `GET {endpoint}/_cluster/health`.
    async fn health(&self, endpoint: &str) -> Result<HealthSnapshot>;

    /// `POST {endpoint}/_cluster/nodes/_local/_shutdown`.
    async fn shutdown_local(&self, endpoint: &str) -> Result<()>;

    /// `PUT {endpoint}/_cluster/settings`.
    async fn update_settings(&self, endpoint: &str, settings: &Value) -> Result<SettingsAck>;
}

/// One entry of the `_nodes` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Node id (the key of the `nodes` object).
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Raw bound address, e.g. `inet[/10.0.0.1:9200]`.
    pub http_address: Option<String>,
    pub host: String,
}

/// A single `_cluster/health` response.
///
/// Kept as an open map so any field can be matched; nothing is cached
/// between polls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthSnapshot(Map<String, Value>);

impl HealthSnapshot {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Strict equality of a single field against an expected value.
    pub fn matches(&self, field: &str, expected: &Value) -> bool {
        self.get(field) == Some(expected)
    }

    /// Cluster status (`red`, `yellow`, `green`).
    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }

    /// Number of nodes currently in the cluster.
    pub fn number_of_nodes(&self) -> Option<u64> {
        self.get("number_of_nodes").and_then(Value::as_u64)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Value> for HealthSnapshot {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// Response to a settings update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsAck {
    /// Absent when the cluster did not say.
    #[serde(default)]
    pub acknowledged: Option<bool>,
}

/// Cluster management API client over HTTP.
pub struct HttpClusterApi {
    client: Client,
}

impl HttpClusterApi {
    /// Create a new client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .user_agent(format!("rolling-restart/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RestartError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Build URL for an API path
    fn url(endpoint: &str, path: &str) -> String {
        format!("{}{}", endpoint.trim_end_matches('/'), path)
    }

    /// Turn transport failures and non-2xx statuses into connectivity errors.
    async fn check_status(
        url: &str,
        resp: std::result::Result<Response, reqwest::Error>,
    ) -> Result<Response> {
        let resp = resp.map_err(|e| RestartError::connectivity(url, e))?;
        let status = resp.status();

        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(RestartError::connectivity(
                url,
                format!("request failed with status {}: {}", status, body),
            ))
        }
    }

    async fn json<T: DeserializeOwned>(url: &str, resp: Response) -> Result<T> {
        resp.json().await.map_err(|e| {
            RestartError::connectivity(url, format!("failed to parse response: {}", e))
        })
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn nodes(&self, endpoint: &str) -> Result<Vec<NodeEntry>> {
        let url = Self::url(endpoint, "/_nodes");
        debug!(url = %url, "Listing cluster nodes");

        let resp = Self::check_status(&url, self.client.get(&url).send().await).await?;
        let body: Value = Self::json(&url, resp).await?;

        let nodes = match body.get("nodes") {
            Some(Value::Object(nodes)) => nodes,
            _ => return Ok(Vec::new()),
        };

        nodes.iter().map(|(id, entry)| parse_node_entry(id, entry)).collect()
    }

    async fn health(&self, endpoint: &str) -> Result<HealthSnapshot> {
        let url = Self::url(endpoint, "/_cluster/health");
        let resp = Self::check_status(&url, self.client.get(&url).send().await).await?;
        Self::json(&url, resp).await
    }

    async fn shutdown_local(&self, endpoint: &str) -> Result<()> {
        let url = Self::url(endpoint, "/_cluster/nodes/_local/_shutdown");
        debug!(url = %url, "Requesting local node shutdown");

        Self::check_status(&url, self.client.post(&url).send().await).await?;
        Ok(())
    }

    async fn update_settings(&self, endpoint: &str, settings: &Value) -> Result<SettingsAck> {
        let url = Self::url(endpoint, "/_cluster/settings");
        debug!(url = %url, settings = %settings, "Updating cluster settings");

        let resp = self.client.put(&url).json(settings).send().await;
        let resp = Self::check_status(&url, resp).await?;
        Self::json(&url, resp).await
    }
}

/// Decode one `nodes` entry, keyed by node id.
///
/// A malformed entry is bad cluster data, not a transient failure.
fn parse_node_entry(id: &str, entry: &Value) -> Result<NodeEntry> {
    let mut node: NodeEntry = serde_json::from_value(entry.clone()).map_err(|e| {
        RestartError::InvalidSnapshot(format!("malformed node entry {}: {}", id, e))
    })?;
    node.id = id.to_string();
    Ok(node)
}
