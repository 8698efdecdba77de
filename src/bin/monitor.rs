use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{error, info};

use production_monitor::logging::init_logging;
use production_monitor::monitor::client::MonitoringClient;
use production_monitor::monitor::config::MonitorConfig;
use production_monitor::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Production monitoring client", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Directory for log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a single liveness ping
    Ping,
    /// Ping every `ping_interval` minutes until interrupted
    Heartbeat,
}

async fn heartbeat(client: &MonitoringClient, config: &MonitorConfig) {
    let mut ticker = tokio::time::interval(config.ping_interval());
    info!(interval_secs = config.ping_interval().as_secs(), "Heartbeat started.");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                client.ping().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Heartbeat stopped.");
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_dir, "monitor.log");

    let config = match MonitorConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load monitor configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let client = match MonitoringClient::from_config(&config) {
        Ok(client) => Some(client),
        Err(e) => {
            error!("Cannot reach the monitoring service: {}", e);
            None
        }
    };

    match args.command {
        Command::Ping => {
            let sent = match &client {
                Some(client) => client.ping().await,
                None => false,
            };
            if sent {
                println!("✅ Ping sent successfully");
                ExitCode::SUCCESS
            } else {
                println!("❌ Failed to send ping");
                ExitCode::FAILURE
            }
        }
        Command::Heartbeat => match &client {
            Some(client) => {
                heartbeat(client, &config).await;
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
    }
}
