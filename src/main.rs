mod config;
mod handler;
mod logging;
mod metrics;
mod server;

use anyhow::Result;
use clap::Parser;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::config::{LogLevel, ServerConfig, DEFAULT_PORT, ENV_PORT};
use crate::handler::state::{http_client_builder, ProxyState};

#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct Args {
    /// The bind port (overridden by a valid PORT environment variable)
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Set the log level
    #[arg(short = 'l', long = "log", value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Emit JSON log lines
    #[arg(long, action)]
    json: bool,

    /// Serve Prometheus metrics on 127.0.0.1:<METRICS_PORT>
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long = "shutdown-timeout", default_value_t = 10)]
    shutdown_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, invalid_port) =
        ServerConfig::resolve(&args, std::env::var(ENV_PORT).ok());
    if let Some(invalid_port) = invalid_port {
        eprintln!("{invalid_port}");
    }

    logging::init(&config);

    if let Some(metrics_port) = config.metrics_port {
        let loopback_address = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        metrics::init(SocketAddr::new(loopback_address, metrics_port))?;
    }

    let state = ProxyState {
        http_client: http_client()?,
    };

    server::run(&config, state).await;

    Ok(())
}

fn http_client() -> Result<reqwest::Client> {
    let http_client = http_client_builder().build()?;
    Ok(http_client)
}
