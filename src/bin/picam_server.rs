//! Camera Web Service
//!
//! Serves stills and video from the Raspberry Pi camera over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use picam_web::{
    camera::open_camera,
    config::{AppConfig, BackendKind},
    web::WebServer,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP front-end for the Raspberry Pi camera")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long)]
    address: Option<String>,

    /// Run in debug mode
    #[arg(long)]
    debug: bool,

    /// Use the synthetic test pattern camera
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging before anything else can log
    let rust_log = std::env::var("RUST_LOG").ok();
    let default_level = if args.debug { "debug" } else { "info" };
    let (filter, filter_handle) = reload::Layer::new(EnvFilter::new(
        rust_log.as_deref().unwrap_or(default_level),
    ));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(port) = args.port {
        config.server.http_port = port;
    }
    if let Some(address) = args.address {
        config.server.bind_address = address;
    }
    if args.debug {
        config.server.debug = true;
    }
    if args.mock {
        config.camera.backend = BackendKind::Mock;
    }
    config.validate()?;

    // Debug mode can also come from the config file
    if config.server.debug && !args.debug && rust_log.is_none() {
        filter_handle.modify(|filter| *filter = EnvFilter::new("debug"))?;
    }

    tracing::info!("Starting camera web service");
    tracing::info!("Initializing on host address '{}'", config.server.bind_address);
    tracing::info!("Initializing on port '{}'", config.server.http_port);
    tracing::info!("Starting web server in debug mode: {}", config.server.debug);

    let camera = open_camera(&config.camera);
    let server = WebServer::new(config, camera);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
