// Cluster simulation for integration tests
// Simulates a search cluster behind the management API and the ssh channel

use async_trait::async_trait;
use rolling_restart::client::{ClusterApi, HealthSnapshot, NodeEntry, SettingsAck};
use rolling_restart::error::{RestartError, Result};
use rolling_restart::remote::{RemoteExecutor, RemoteOutput};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Cluster entry URL used by every simulated cluster
pub const CLUSTER_URL: &str = "http://cluster.test:9200";

/// Something the tool did to the cluster, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Nodes(String),
    Health(String),
    Settings(String, String),
    Shutdown(String),
    Start(String, String),
}

impl Event {
    /// Endpoint or host this event targeted
    pub fn target(&self) -> &str {
        match self {
            Event::Nodes(t)
            | Event::Health(t)
            | Event::Settings(t, _)
            | Event::Shutdown(t)
            | Event::Start(t, _) => t,
        }
    }
}

/// Simulated node state
#[derive(Debug, Clone)]
pub struct SimulatedNode {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub host: String,
    pub up: bool,
}

impl SimulatedNode {
    pub fn endpoint(&self) -> String {
        format!("http://{}:9200", self.ip)
    }
}

#[derive(Default)]
struct SimState {
    nodes: Vec<SimulatedNode>,
    allocation: String,
    events: Vec<Event>,
    cluster_status: Option<String>,
    shutdown_fails: HashSet<String>,
    start_exit_codes: HashMap<String, i32>,
    ack_missing: HashSet<String>,
    never_green_after_restart: HashSet<String>,
    restarted: HashSet<String>,
    rejoin_lag: HashMap<String, u32>,
    never_rejoins: HashSet<String>,
}

impl SimState {
    fn node_by_endpoint(&self, endpoint: &str) -> Option<&SimulatedNode> {
        self.nodes.iter().find(|n| n.endpoint() == endpoint)
    }

    fn up_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.up).count()
    }
}

/// In-memory cluster implementing both the management API and remote start
pub struct SimulatedCluster {
    state: Mutex<SimState>,
}

/// Builder for simulated clusters
pub struct ClusterBuilder {
    names: Vec<String>,
    state: SimState,
}

impl ClusterBuilder {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            state: SimState {
                allocation: "all".to_string(),
                ..SimState::default()
            },
        }
    }

    /// Cluster entry URL always reports this status
    pub fn cluster_status(mut self, status: &str) -> Self {
        self.state.cluster_status = Some(status.to_string());
        self
    }

    /// Shutdown call for this node answers with HTTP 500
    pub fn shutdown_fails(mut self, name: &str) -> Self {
        self.state.shutdown_fails.insert(name.to_string());
        self
    }

    /// Remote start on this node exits with the given code
    pub fn start_exits_with(mut self, name: &str, code: i32) -> Self {
        self.state.start_exit_codes.insert(name.to_string(), code);
        self
    }

    /// Settings writes through this node come back without acknowledgment
    pub fn ack_missing(mut self, name: &str) -> Self {
        self.state.ack_missing.insert(name.to_string());
        self
    }

    /// Node stays yellow forever once restarted
    pub fn never_green_after_restart(mut self, name: &str) -> Self {
        self.state.never_green_after_restart.insert(name.to_string());
        self
    }

    /// Node ignores this many health polls after start before it is back
    pub fn rejoin_lag(mut self, name: &str, polls: u32) -> Self {
        self.state.rejoin_lag.insert(name.to_string(), polls);
        self
    }

    /// Remote start on this node succeeds but the process never comes back
    pub fn never_rejoins(mut self, name: &str) -> Self {
        self.state.never_rejoins.insert(name.to_string());
        self
    }

    pub fn build(mut self) -> SimulatedCluster {
        self.state.nodes = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| SimulatedNode {
                id: format!("node-id-{}", i),
                name: name.clone(),
                ip: format!("10.0.0.{}", i + 1),
                host: format!("{}.search.test", name.to_lowercase()),
                up: true,
            })
            .collect();

        SimulatedCluster {
            state: Mutex::new(self.state),
        }
    }
}

impl SimulatedCluster {
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn allocation(&self) -> String {
        self.state.lock().unwrap().allocation.clone()
    }

    pub fn node(&self, name: &str) -> SimulatedNode {
        self.state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .find(|n| n.name == name)
            .cloned()
            .unwrap()
    }

    /// Events touching a node's endpoint or host
    pub fn events_for(&self, name: &str) -> Vec<Event> {
        let node = self.node(name);
        let endpoint = node.endpoint();
        self.events()
            .into_iter()
            .filter(|e| e.target() == endpoint || e.target() == node.host)
            .collect()
    }

    /// Non-health events in order, for comparing against an expected script
    pub fn actions(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Health(_)))
            .collect()
    }

    pub fn health_polls(&self, endpoint: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Health(t) if t == endpoint))
            .count()
    }
}

#[async_trait]
impl ClusterApi for SimulatedCluster {
    async fn nodes(&self, endpoint: &str) -> Result<Vec<NodeEntry>> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.events.push(Event::Nodes(endpoint.to_string()));

        Ok(state
            .nodes
            .iter()
            .map(|n| NodeEntry {
                id: n.id.clone(),
                name: n.name.clone(),
                http_address: Some(format!("inet[/{}:9200]", n.ip)),
                host: n.host.clone(),
            })
            .collect())
    }

    async fn health(&self, endpoint: &str) -> Result<HealthSnapshot> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.events.push(Event::Health(endpoint.to_string()));

        let mut status = if state.up_count() == state.nodes.len() {
            "green".to_string()
        } else {
            "yellow".to_string()
        };

        if endpoint == CLUSTER_URL {
            if let Some(ref forced) = state.cluster_status {
                status = forced.clone();
            }
        } else {
            let node = state
                .node_by_endpoint(endpoint)
                .cloned()
                .ok_or_else(|| RestartError::Connectivity {
                    endpoint: endpoint.to_string(),
                    reason: "unknown host".to_string(),
                })?;

            if let Some(lag) = state.rejoin_lag.get_mut(&node.name) {
                if !node.up && *lag > 0 {
                    *lag -= 1;
                    if *lag == 0 {
                        let n = state.nodes.iter_mut().find(|n| n.name == node.name).unwrap();
                        n.up = true;
                    }
                    return Err(RestartError::Connectivity {
                        endpoint: endpoint.to_string(),
                        reason: "connection refused".to_string(),
                    });
                }
            }

            if !node.up {
                return Err(RestartError::Connectivity {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".to_string(),
                });
            }

            if state.restarted.contains(&node.name)
                && state.never_green_after_restart.contains(&node.name)
            {
                status = "yellow".to_string();
            }
        }

        Ok(HealthSnapshot::from(json!({
            "cluster_name": "sim",
            "status": status,
            "timed_out": false,
            "number_of_nodes": state.up_count(),
            "number_of_data_nodes": state.up_count(),
        })))
    }

    async fn shutdown_local(&self, endpoint: &str) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.events.push(Event::Shutdown(endpoint.to_string()));

        let name = state
            .node_by_endpoint(endpoint)
            .map(|n| n.name.clone())
            .unwrap_or_default();

        if state.shutdown_fails.contains(&name) {
            return Err(RestartError::Connectivity {
                endpoint: format!("{}/_cluster/nodes/_local/_shutdown", endpoint),
                reason: "request failed with status 500 Internal Server Error".to_string(),
            });
        }

        if let Some(node) = state.nodes.iter_mut().find(|n| n.name == name) {
            node.up = false;
        }
        Ok(())
    }

    async fn update_settings(&self, endpoint: &str, settings: &Value) -> Result<SettingsAck> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        let value = settings["transient"]["cluster.routing.allocation.enable"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        state.events.push(Event::Settings(endpoint.to_string(), value.clone()));

        let name = state
            .node_by_endpoint(endpoint)
            .map(|n| n.name.clone())
            .unwrap_or_default();
        if state.ack_missing.contains(&name) {
            return Ok(SettingsAck { acknowledged: None });
        }

        state.allocation = value;
        Ok(SettingsAck {
            acknowledged: Some(true),
        })
    }
}

#[async_trait]
impl RemoteExecutor for SimulatedCluster {
    async fn execute(&self, host: &str, command: &str) -> Result<RemoteOutput> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.events.push(Event::Start(host.to_string(), command.to_string()));

        let name = state
            .nodes
            .iter()
            .find(|n| n.host == host)
            .map(|n| n.name.clone())
            .unwrap_or_default();

        if let Some(&code) = state.start_exit_codes.get(&name) {
            return Ok(RemoteOutput {
                exit_code: Some(code),
                stdout: String::new(),
                stderr: "elasticsearch: command not found".to_string(),
            });
        }

        state.restarted.insert(name.clone());
        let lagging = state.rejoin_lag.get(&name).copied().unwrap_or(0) > 0;
        if !lagging && !state.never_rejoins.contains(&name) {
            if let Some(node) = state.nodes.iter_mut().find(|n| n.name == name) {
                node.up = true;
            }
        }

        Ok(RemoteOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
