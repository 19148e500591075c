//! Stub Server - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use stub_server::config::load_configuration_file;
use stub_server::server::shutdown_signal;
use stub_server::{ConfigurationSet, StubServer};
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "stub-server",
    about = "Configuration-driven HTTP stub server",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "stubs.yaml")]
    config: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8882")]
    listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print a sample configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let sample = include_str!("../demos/default-config.yaml");
        println!("{}", sample);
        return Ok(());
    }

    // A bad document is fatal at startup; nothing is served.
    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        load_configuration_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using empty configuration (no endpoints)");
        ConfigurationSet::empty()
    };

    if args.validate {
        println!("Configuration is valid ({} endpoints defined)", config.len());
        return Ok(());
    }

    let server = Arc::new(StubServer::new(config));

    #[cfg(unix)]
    server.spawn_reload_on_hangup(args.config.clone())?;

    let listener = TcpListener::bind(args.listen).await?;
    server.serve(listener, shutdown_signal()).await?;

    Ok(())
}
