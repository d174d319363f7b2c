//! voxpersona-server: the HTTP surface of the persona voice chatbot.
//!
//! Loads configuration, builds the long-lived services (language model,
//! TTS engine), starts the server, and runs until ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;
use voxpersona::{AppConfig, ChatServer, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("VOXPERSONA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("voxpersona.toml"));
    let config = AppConfig::load(&config_path)?;
    tracing::info!(config = %config_path.display(), "voxpersona starting");

    let services = Arc::new(Services::initialize(config).await?);
    let server = ChatServer::start(Arc::clone(&services)).await?;
    tracing::info!("ready on http://{}", server.addr());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    services.shutdown();
    server.shutdown();
    Ok(())
}
