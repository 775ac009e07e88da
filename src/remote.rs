//! Stopping and starting node processes.
//!
//! Shutdown goes through the node's own management API. Start runs the node
//! binary on its host over ssh through a [`RemoteExecutor`].

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::client::ClusterApi;
use crate::config::RestartConfig;
use crate::error::{RestartError, Result};

/// Result of a finished remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOutput {
    /// Exit code, absent if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RemoteOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a shell command line on a remote host.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, host: &str, command: &str) -> Result<RemoteOutput>;
}

/// Executes commands through the system `ssh` client with key-based login.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    user: String,
    port: u16,
    program: String,
}

impl SshExecutor {
    pub fn new(user: impl Into<String>, port: u16) -> Self {
        Self {
            user: user.into(),
            port,
            program: "ssh".to_string(),
        }
    }

    /// Use a different ssh binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments passed to the ssh client.
    pub fn args(&self, host: &str, command: &str) -> Vec<String> {
        vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            format!("{}@{}", self.user, host),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, host: &str, command: &str) -> Result<RemoteOutput> {
        debug!(host = %host, user = %self.user, port = self.port, "Opening ssh session");

        let output = Command::new(&self.program)
            .args(self.args(host, command))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RestartError::RemoteExecution {
                host: host.to_string(),
                exit_code: None,
                stderr: format!("failed to spawn {}: {}", self.program, e),
            })?;

        Ok(RemoteOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Command line that daemonizes a node process after a settle delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCommand {
    pub binary: String,
    pub config: String,
    pub pid_file: String,
    pub delay: Duration,
}

impl StartCommand {
    pub fn from_config(config: &RestartConfig, delay: Duration) -> Self {
        Self {
            binary: config.es_binary.clone(),
            config: config.es_config.clone(),
            pid_file: config.es_pid.clone(),
            delay,
        }
    }

    /// Render the full shell command line.
    pub fn render(&self) -> String {
        [
            "source .profile &&".to_string(),
            format!("sleep {} &&", self.delay.as_secs()),
            self.binary.clone(),
            format!("--config {}", self.config),
            format!("-p {}", self.pid_file),
            "-d".to_string(),
        ]
        .join(" ")
    }
}

/// Stops nodes through the management API and starts them over a remote
/// execution channel.
pub struct RemoteProcessController<'a> {
    api: &'a dyn ClusterApi,
    executor: &'a dyn RemoteExecutor,
    config: &'a RestartConfig,
}

impl<'a> RemoteProcessController<'a> {
    pub fn new(
        api: &'a dyn ClusterApi,
        executor: &'a dyn RemoteExecutor,
        config: &'a RestartConfig,
    ) -> Self {
        Self { api, executor, config }
    }

    /// Ask the node behind `endpoint` to shut itself down.
    pub async fn shutdown_node(&self, endpoint: &str) -> Result<()> {
        self.api.shutdown_local(endpoint).await?;
        info!(endpoint = %endpoint, "Node shutdown acknowledged");
        Ok(())
    }

    /// Start the node process on `hostname` after waiting `delay` there.
    ///
    /// A non-zero exit status is fatal.
    pub async fn start_node(&self, hostname: &str, delay: Duration) -> Result<RemoteOutput> {
        let command = StartCommand::from_config(self.config, delay).render();
        info!(host = %hostname, command = %command, "Starting node");

        let output = self.executor.execute(hostname, &command).await?;
        if !output.success() {
            return Err(RestartError::RemoteExecution {
                host: hostname.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}
