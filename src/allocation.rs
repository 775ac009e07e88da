//! Cluster-wide shard allocation toggle.

use serde_json::{json, Value};
use std::fmt;
use tracing::info;

use crate::client::{ClusterApi, SettingsAck};
use crate::error::{RestartError, Result};

/// Transient setting that controls shard allocation.
pub const ALLOCATION_SETTING: &str = "cluster.routing.allocation.enable";

/// Desired shard allocation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardAllocation {
    /// Allocate all shards (`"all"`).
    Enable,
    /// Allocate nothing (`"none"`).
    Disable,
}

impl ShardAllocation {
    /// Value written to the allocation setting.
    pub fn setting_value(self) -> &'static str {
        match self {
            ShardAllocation::Enable => "all",
            ShardAllocation::Disable => "none",
        }
    }

    /// Settings body for `PUT _cluster/settings`.
    pub fn settings_body(self) -> Value {
        json!({ "transient": { ALLOCATION_SETTING: self.setting_value() } })
    }
}

impl fmt::Display for ShardAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardAllocation::Enable => write!(f, "enable shard allocation"),
            ShardAllocation::Disable => write!(f, "disable shard allocation"),
        }
    }
}

/// Switch shard allocation through `endpoint`.
///
/// The write must be explicitly acknowledged; a missing or false
/// `acknowledged` flag fails just like a transport error. No retry.
pub async fn set_shard_allocation(
    api: &dyn ClusterApi,
    endpoint: &str,
    mode: ShardAllocation,
) -> Result<SettingsAck> {
    let ack = api.update_settings(endpoint, &mode.settings_body()).await?;

    if ack.acknowledged != Some(true) {
        return Err(RestartError::AckFailure {
            operation: mode.to_string(),
            endpoint: endpoint.to_string(),
        });
    }

    info!(endpoint = %endpoint, allocation = mode.setting_value(), "Shard allocation updated");
    Ok(ack)
}
