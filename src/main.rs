//! rolling-restart - main entry point.

use anyhow::Context;
use rolling_restart::cli::{Cli, Commands};
use rolling_restart::client::{ClusterApi, HttpClusterApi};
use rolling_restart::config::RestartConfig;
use rolling_restart::discovery::discover_nodes;
use rolling_restart::orchestrator::{RestartReport, RollingRestart};
use rolling_restart::output;
use rolling_restart::remote::SshExecutor;
use rolling_restart::telemetry;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.no_color {
        console::set_colors_enabled(false);
    }

    if let Err(e) = run(cli).await {
        output::error("Could not complete rolling restart due to the following error:");
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        RestartConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_to(&mut config);
    config.validate()?;

    telemetry::init(&config.log_level, config.json_logs)?;

    let api = HttpClusterApi::new(config.request_timeout)?;
    let ssh = SshExecutor::new(config.ssh_user.clone(), config.ssh_port);

    match cli.command {
        Commands::Restart { dry_run } => {
            let restart = RollingRestart::new(&api, &ssh, &config);
            if dry_run {
                print_plan(&restart).await?;
            } else {
                let report = restart.run().await?;
                print_report(&report);
            }
        }

        Commands::Nodes => {
            let nodes = discover_nodes(&api, &config.cluster_url).await?;

            output::print_header("Cluster Nodes");
            for node in &nodes {
                let location = format!("{} ({})", node.management_endpoint, node.hostname);
                output::print_kv(&node.name, location);
            }
        }

        Commands::Health => {
            let health = api.health(&config.cluster_url).await?;

            output::print_header("Cluster Health");
            let status = health.status().unwrap_or("unknown");
            output::print_kv("Status", output::status_indicator(status));
            for (key, value) in health.fields() {
                if key != "status" {
                    output::print_kv(key, value);
                }
            }
        }
    }

    Ok(())
}

async fn print_plan(restart: &RollingRestart<'_>) -> anyhow::Result<()> {
    let context = restart.prepare().await?;

    output::print_header("Rolling Restart Plan");
    output::print_kv("Baseline node count", context.baseline_node_count());

    for node in context.nodes() {
        output::print_header(&format!("Node: {}", node));
        for (step, detail) in restart.plan(&context, node) {
            output::print_kv(&step.to_string(), detail);
        }
    }

    output::warning("Dry run: no changes were made");
    Ok(())
}

fn print_report(report: &RestartReport) {
    output::print_header("Restarted Nodes");
    for entry in &report.nodes {
        output::print_kv(&entry.node.name, output::format_duration(entry.elapsed));
    }
    output::print_kv("Total", output::format_duration(report.elapsed));

    println!();
    output::success("Cluster reboot is a success!");
}
