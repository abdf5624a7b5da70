//! DocuChat server binary - composition root.
//!
//! Ties together the DocuChat crates into a single executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the SQLite document store
//! 3. Build the Ollama gateway client
//! 4. Start the axum REST API server with SSE chat streaming

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use docuchat_api::AppState;
use docuchat_core::config::DocuChatConfig;
use docuchat_gateway::OllamaGateway;
use docuchat_storage::Database;

mod cli;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();

    // Tracing: CLI flag wins, then RUST_LOG, then the config default later.
    let filter = if let Some(ref level) = args.log_level {
        tracing_subscriber::EnvFilter::new(level.clone())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting DocuChat v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = DocuChatConfig::load_or_default(&config_file);
    if let Some(ref url) = args.ollama_url {
        config.gateway.base_url = url.clone();
    }
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| resolve_data_dir(&config.general.data_dir));
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("docuchat.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Gateway.
    let gateway = Arc::new(OllamaGateway::new(&config.gateway)?);
    tracing::info!(
        base_url = %config.gateway.base_url,
        default_model = %config.gateway.default_model,
        "Ollama gateway client ready"
    );

    // === API server ===

    let port = args.resolve_port(config.general.port);
    let state = AppState::new(config, db, gateway);

    docuchat_api::routes::start_server(state, port).await?;

    Ok(())
}
