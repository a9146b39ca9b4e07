//! docfeed HTTP gateway binary.

use clap::Parser;
use docfeed_core::DocumentStore;
use docfeed_gateway::{create_router, AppState, Args, GatewayConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let args = Args::parse();

    // Initialize tracing
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "docfeed_gateway={0},docfeed_core={0},tower_http={0}",
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from(&args);

    info!(
        listen = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        collection = %config.collection,
        "Starting docfeed gateway"
    );

    // Open the shared document store
    let store = DocumentStore::open(config.storage_config())?;
    store.create_collection(&config.collection)?;
    info!(
        changelog_retention = config.changelog_retention,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Document store ready"
    );

    // Create application state
    let state = AppState::new(store, config.clone());

    // Create router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
