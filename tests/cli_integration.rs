//! CLI integration tests
//!
//! Runs the `rolling-restart` binary and checks its exit status and
//! operator-facing output.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::io::Write;
use std::process::Output;
use tokio::net::TcpListener;
use tokio::process::Command;

// ============================================================================
// Test Helpers
// ============================================================================

/// Nothing listens on port 1 on a test host.
const UNREACHABLE_URL: &str = "http://127.0.0.1:1";

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

/// Config with short waits so failures surface quickly.
fn fast_config(cluster_url: &str) -> tempfile::NamedTempFile {
    write_config(&format!(
        r#"
cluster_url = "{}"
request_timeout = "2s"

[retry.precheck]
max_attempts = 1
min_delay = "10ms"
max_delay = "10ms"
"#,
        cluster_url
    ))
}

async fn run_cli(config: &tempfile::NamedTempFile, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rolling-restart"))
        .arg("--config")
        .arg(config.path())
        .arg("--no-color")
        .args(args)
        .env_remove("ROLLING_RESTART_CLUSTER_URL")
        .env_remove("ROLLING_RESTART_SSH_PORT")
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("failed to run rolling-restart binary")
}

async fn serve_health() -> String {
    let app = Router::new().route(
        "/_cluster/health",
        get(|| async {
            Json::<Value>(json!({
                "cluster_name": "logs",
                "status": "green",
                "number_of_nodes": 3
            }))
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Exit Codes
// ============================================================================

#[tokio::test]
async fn test_unreachable_cluster_exits_with_one() {
    let config = fast_config(UNREACHABLE_URL);

    let output = run_cli(&config, &["restart"]).await;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not complete rolling restart"), "stderr: {}", stderr);
    assert!(stderr.contains("Gave up waiting"), "stderr: {}", stderr);
}

#[tokio::test]
async fn test_invalid_config_exits_with_one() {
    let config = write_config(
        r#"
cluster_url = "http://127.0.0.1:9200"

[retry.rejoin]
max_attempts = 0
"#,
    );

    let output = run_cli(&config, &["restart"]).await;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("retry.rejoin"), "stderr: {}", stderr);
}

#[tokio::test]
async fn test_unparsable_config_exits_with_one() {
    let config = write_config("ssh_port = \"not a port\"\n");

    let output = run_cli(&config, &["health"]).await;

    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test]
async fn test_health_exits_with_zero() {
    let url = serve_health().await;
    let config = fast_config(&url);

    let output = run_cli(&config, &["health"]).await;

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("green"), "stdout: {}", stdout);
    assert!(stdout.contains("number_of_nodes"), "stdout: {}", stdout);
}

#[tokio::test]
async fn test_missing_subcommand_is_rejected() {
    let config = fast_config(UNREACHABLE_URL);

    let output = run_cli(&config, &[]).await;

    assert!(!output.status.success());
}
