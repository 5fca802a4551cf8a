use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use kvsearch::{Driver, EngineConfig};
use server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Store directory; overrides `storage` from the configuration
    #[arg(long)]
    storage: Option<PathBuf>,
    /// Store driver (sled or memory); overrides the configuration
    #[arg(long)]
    driver: Option<Driver>,
    /// Index name
    #[arg(long, default_value = "default")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(storage) = args.storage {
        config.storage = Some(storage);
    }
    if let Some(driver) = args.driver {
        config.driver = driver;
    }
    let app: Router = build_app(config, &args.index)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %args.index, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
