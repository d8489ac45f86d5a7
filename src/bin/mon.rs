//! `mon`: telemetry dashboard for a node fleet's agents (C12).

use clap::{Parser, Subcommand};
use log::error;
use tokio_util::sync::CancellationToken;

use picl::config::ClusterConfig;
use picl::error::PiclError;
use picl::telemetry::client::TelemetryClient;
use picl::telemetry::display::{DisplayHandler, LineHandler, SilentHandler, TableHandler};
use picl::telemetry::pipeline;

#[derive(Parser)]
#[command(name = "mon", about = "Poll node agents for telemetry and render a dashboard")]
struct Cli {
    #[arg(long, env = "PICL_CONFIG", default_value = "")]
    config: String,
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll every node's agent and render a live dashboard.
    Monitor {
        /// `table` (default, a full-screen TUI), `line` (one line per sample), or
        /// `silent` (discard samples; useful for scripting).
        #[arg(long, default_value = "table")]
        handler: String,
    },
    /// Print one node's host identification and uptime.
    AgentInfo {
        #[arg(long)]
        node: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    picl::logging::init_logging(&cli.log_level);
    std::process::exit(match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            1
        }
    });
}

async fn run(cli: Cli) -> Result<(), PiclError> {
    let cluster = ClusterConfig::load(&cli.config)?;

    match cli.command {
        Command::Monitor { handler } => run_monitor(&cluster, &handler).await,
        Command::AgentInfo { node } => run_agent_info(&cluster, &node).await,
    }
}

async fn run_monitor(cluster: &ClusterConfig, handler_name: &str) -> Result<(), PiclError> {
    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let mut handler = match handler_name {
        "line" => DisplayHandler::Line(LineHandler),
        "silent" => DisplayHandler::Silent(SilentHandler::default()),
        _ => DisplayHandler::Table(
            TableHandler::new(&cluster.hosts).map_err(|e| PiclError::ConfigError(e.to_string()))?,
        ),
    };

    pipeline::run(&cluster.hosts, &mut handler, token).await
}

async fn run_agent_info(cluster: &ClusterConfig, node_name: &str) -> Result<(), PiclError> {
    let node = cluster
        .hosts
        .iter()
        .find(|n| n.name == node_name)
        .ok_or_else(|| PiclError::InvalidNode(node_name.to_string()))?;
    let base_url = node
        .agent_base_url()
        .ok_or_else(|| PiclError::ConfigError(format!("{node_name} has no agent configured")))?;

    let mut client = TelemetryClient::new(base_url);
    if let Some(agent) = node.agent.as_ref() {
        if let Some(auth) = agent.auth_data.as_ref() {
            client.login(auth).await?;
        }
    }

    let info = client.host_info().await?;
    println!(
        "{}: {} ({}) up {} ({}s)",
        node_name, info.hostname, info.kernel_arch, info.human_uptime, info.uptime
    );
    Ok(())
}
