use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

mod api;
mod cache;
mod chunker;
mod config;
mod db;
mod embedding;
mod error;
mod jobs;
mod segmentation;
mod segments;
mod service;
mod vector_store;

use crate::config::StaticConfig;
use crate::db::Database;
use crate::service::ScriptoriumService;

// Re-export config crate types to avoid namespace collision
use ::config::{Config as ConfigBuilder, Environment, File};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!(
        "Starting Scriptorium service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let static_config: StaticConfig = ConfigBuilder::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("SCRIPTORIUM")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    info!(
        host = %static_config.server.host,
        port = static_config.server.port,
        "Static configuration loaded"
    );

    // Ensure data directory exists
    std::fs::create_dir_all(&static_config.storage.data_dir)?;

    let db_path = static_config.storage.data_dir.join("scriptorium.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let config = Arc::new(static_config);
    let service = Arc::new(ScriptoriumService::new(db, config.clone())?);

    // Documents left in processing by a previous run cannot resume; fail
    // them, then kick the queue to drain anything still waiting
    match service.recover_orphaned_documents() {
        Ok(count) if count > 0 => info!(count, "Recovered orphaned documents"),
        Err(e) => tracing::warn!(error = %e, "Orphaned document recovery failed"),
        _ => {}
    }
    service.kick_queue();

    let app = api::router(service.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scriptorium_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
