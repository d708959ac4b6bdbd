//! Venom traffic control service
//!
//! Serves the traffic-control status, metrics and governance endpoints.

#![allow(missing_docs)]

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use venom_traffic::utils::logging::{DEFAULT_LOG_FILTER, init_tracing};
use venom_traffic::{Config, Result, server};

/// Configuration file used when `--config` is not given and the file exists
const DEFAULT_CONFIG_PATH: &str = "config/venom.yaml";

#[derive(Parser)]
#[command(name = "venom-traffic", version, about = "API traffic control service")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, env = "VENOM_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host (overrides config and VENOM_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and VENOM_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit JSON formatted logs
    #[arg(long)]
    json_logs: bool,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = load_config(&cli).await;
    let json_logs = cli.json_logs || config.as_ref().is_ok_and(|c| c.server.json_logs);
    init_tracing(json_logs, DEFAULT_LOG_FILTER);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        return match config.to_yaml() {
            Ok(yaml) => {
                println!("{}", yaml);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    info!(
        "Configuration loaded: outbound default {}/{}s, inbound default {}/{}s",
        config.traffic_control.outbound.default.capacity,
        config.traffic_control.outbound.default.refill_per_sec,
        config.traffic_control.inbound.default.capacity,
        config.traffic_control.inbound.default.refill_per_sec,
    );

    match server::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Display keeps multi-line bind errors readable
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// File (explicit or default) plus environment, then CLI overrides, then validation
async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).await?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::from_file(DEFAULT_CONFIG_PATH).await?
        }
        None => Config::from_env()?,
    };

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;
    Ok(config)
}
