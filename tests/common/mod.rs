//! Common test utilities for integration tests.

pub mod cluster_sim;

pub use cluster_sim::*;

use rolling_restart::config::RestartConfig;
use std::time::Duration;

/// Configuration pointing at the simulated cluster.
pub fn test_config() -> RestartConfig {
    RestartConfig {
        cluster_url: CLUSTER_URL.to_string(),
        es_binary: "elasticsearch/bin/elasticsearch".to_string(),
        es_config: "/etc/elasticsearch/elasticsearch.yml".to_string(),
        es_pid: "elasticsearch.pid".to_string(),
        ssh_user: "logstash".to_string(),
        start_delay: Duration::from_secs(10),
        ..RestartConfig::default()
    }
}
