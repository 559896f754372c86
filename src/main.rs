use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use fieldgw::config::config as global_config;
use fieldgw::device_registry::DeviceRegistry;
use fieldgw::dispatcher::Dispatcher;
use fieldgw::gateway;

#[derive(Debug, Parser)]
#[command(name = "fieldgw", version, about = "Device management and IPC gateway for industrial fieldbus devices")]
struct Cli {
    /// Bind address (loopback recommended; there is no client authentication)
    #[arg(long)]
    bind: Option<String>,

    /// Bind port
    #[arg(long)]
    port: Option<u16>,

    /// Log filter, e.g. "info" or "fieldgw=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = global_config();
    let bind = cli.bind.as_deref().unwrap_or(&cfg.bind_addr);
    let port = cli.port.unwrap_or(cfg.bind_port);
    let addr = format!("{bind}:{port}");

    // bind failure is the one fatal error: abort startup with a non-zero exit
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "fieldgw listening");

    let registry = Arc::new(DeviceRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(registry));
    gateway::serve(listener, dispatcher).await?;
    Ok(())
}
