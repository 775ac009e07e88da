//! Configuration module for the rolling restart tool.
//!
//! Settings are read once at startup from a TOML file, then overridden by
//! `ROLLING_RESTART_*` environment variables and finally by CLI flags. The
//! resulting [`RestartConfig`] is immutable for the rest of the run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::RetryPolicy;
use crate::error::{RestartError, Result};

/// Main configuration for a restart run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartConfig {
    /// URL used to make the initial connection to the cluster.
    #[serde(default = "default_cluster_url")]
    pub cluster_url: String,

    /// Location of the node binary on each host.
    #[serde(default = "default_es_binary")]
    pub es_binary: String,

    /// Location of the node config file on each host.
    #[serde(default = "default_es_config")]
    pub es_config: String,

    /// PID file written by the daemonized node.
    #[serde(default = "default_es_pid")]
    pub es_pid: String,

    /// User to log in to nodes with. Key-based login must be set up.
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    /// SSH port on every node host.
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Delay between shutdown and start, spent on the node host.
    #[serde(with = "humantime_serde", default = "default_start_delay")]
    pub start_delay: Duration,

    /// Timeout for a single management API request.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[serde(default)]
    pub json_logs: bool,

    /// Retry bounds for each wait in the workflow.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry policy per poll call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whole-cluster green check before anything is touched.
    #[serde(default = "RetryPolicy::precheck")]
    pub precheck: RetryPolicy,
    /// Node green check before it is taken down.
    #[serde(default = "RetryPolicy::node_transition")]
    pub node_ready: RetryPolicy,
    /// Node count back to baseline after start.
    #[serde(default = "RetryPolicy::node_transition")]
    pub rejoin: RetryPolicy,
    /// Green again after allocation is re-enabled.
    #[serde(default = "RetryPolicy::initialization")]
    pub initialize: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            precheck: RetryPolicy::precheck(),
            node_ready: RetryPolicy::node_transition(),
            rejoin: RetryPolicy::node_transition(),
            initialize: RetryPolicy::initialization(),
        }
    }
}

impl RetryConfig {
    fn policies(&self) -> [(&'static str, &RetryPolicy); 4] {
        [
            ("retry.precheck", &self.precheck),
            ("retry.node_ready", &self.node_ready),
            ("retry.rejoin", &self.rejoin),
            ("retry.initialize", &self.initialize),
        ]
    }
}

fn default_cluster_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_es_binary() -> String {
    "elasticsearch/bin/elasticsearch".to_string()
}

fn default_es_config() -> String {
    "/etc/elasticsearch/elasticsearch.yml".to_string()
}

fn default_es_pid() -> String {
    "elasticsearch.pid".to_string()
}

fn default_ssh_user() -> String {
    "elasticsearch".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_start_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            cluster_url: default_cluster_url(),
            es_binary: default_es_binary(),
            es_config: default_es_config(),
            es_pid: default_es_pid(),
            ssh_user: default_ssh_user(),
            ssh_port: default_ssh_port(),
            start_delay: default_start_delay(),
            request_timeout: default_request_timeout(),
            log_level: default_log_level(),
            json_logs: false,
            retry: RetryConfig::default(),
        }
    }
}

impl RestartConfig {
    /// Load configuration from an explicit path, or the default location
    /// if present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(Self::default_config_path);

        let mut config = match config_path {
            Some(ref path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RestartError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            RestartError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rolling-restart").join("config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("ROLLING_RESTART_CLUSTER_URL") {
            self.cluster_url = url;
        }
        if let Some(binary) = lookup("ROLLING_RESTART_ES_BINARY") {
            self.es_binary = binary;
        }
        if let Some(config) = lookup("ROLLING_RESTART_ES_CONFIG") {
            self.es_config = config;
        }
        if let Some(pid) = lookup("ROLLING_RESTART_ES_PID") {
            self.es_pid = pid;
        }
        if let Some(user) = lookup("ROLLING_RESTART_SSH_USER") {
            self.ssh_user = user;
        }
        if let Some(port) = lookup("ROLLING_RESTART_SSH_PORT") {
            self.ssh_port = port.trim().parse().map_err(|e| RestartError::InvalidConfig {
                field: "ssh_port".to_string(),
                reason: format!("ROLLING_RESTART_SSH_PORT={:?} is not a port: {}", port, e),
            })?;
        }
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        let url = self.cluster_url.trim();
        if url.is_empty() {
            return Err(invalid("cluster_url", "Cluster URL must not be empty"));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(invalid(
                "cluster_url",
                "Cluster URL must start with http:// or https://",
            ));
        }
        if self.es_binary.trim().is_empty() {
            return Err(invalid("es_binary", "Node binary path must not be empty"));
        }
        if self.ssh_user.trim().is_empty() {
            return Err(invalid("ssh_user", "SSH user must not be empty"));
        }
        // Slept on the remote host with `sleep N`.
        if self.start_delay.subsec_nanos() != 0 {
            return Err(invalid("start_delay", "start_delay must be a whole number of seconds"));
        }

        for (field, policy) in self.retry.policies() {
            if policy.max_attempts == 0 {
                return Err(invalid(field, "max_attempts must be at least 1"));
            }
            if policy.min_delay > policy.max_delay {
                return Err(invalid(field, "min_delay must not exceed max_delay"));
            }
            if policy.multiplier.is_nan() || policy.multiplier < 1.0 {
                return Err(invalid(field, "multiplier must be at least 1.0"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> RestartError {
    RestartError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
