//! Error types for the rolling restart tool.
//!
//! This module provides a unified error type [`RestartError`] for every stage
//! of a restart run, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Retryable**: [`RestartError::Connectivity`] and
//!   [`RestartError::StateMismatch`]. The state poller retries these with
//!   backoff until its attempt budget runs out.
//! - **Fatal**: everything else. A fatal error stops the run at once; nothing
//!   is rolled back.
//!
//! # Example
//!
//! ```rust
//! use rolling_restart::error::RestartError;
//!
//! let err = RestartError::Connectivity {
//!     endpoint: "http://10.0.0.1:9200".into(),
//!     reason: "connection refused".into(),
//! };
//! assert!(err.is_retryable());
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::orchestrator::RestartStep;

/// Main error type for restart operations.
#[derive(Error, Debug)]
pub enum RestartError {
    // Cluster API errors
    #[error("Cannot connect to {endpoint}: {reason}")]
    Connectivity { endpoint: String, reason: String },

    #[error("Cluster state {field} is {actual}, waiting for {expected}")]
    StateMismatch {
        field: String,
        expected: Value,
        actual: Value,
    },

    #[error("Gave up waiting for {field} to be {expected} after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        field: String,
        expected: Value,
        last: Box<RestartError>,
    },

    #[error("{operation} was not acknowledged by {endpoint}")]
    AckFailure { operation: String, endpoint: String },

    // Remote execution errors
    #[error("Remote command on {host} failed (exit code {}): {stderr}", describe_exit(.exit_code))]
    RemoteExecution {
        host: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    // Cluster data errors
    #[error("Invalid node address: {0}")]
    InvalidAddress(String),

    #[error("Invalid health snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("No nodes found in cluster at {0}")]
    NoNodes(String),

    // Orchestration errors
    #[error("Node {node} failed while {step}: {source}")]
    NodeStep {
        node: String,
        step: RestartStep,
        #[source]
        source: Box<RestartError>,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl RestartError {
    /// Check if the state poller may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RestartError::Connectivity { .. } | RestartError::StateMismatch { .. }
        )
    }

    pub(crate) fn connectivity(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        RestartError::Connectivity {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Result type alias for restart operations.
pub type Result<T> = std::result::Result<T, RestartError>;
