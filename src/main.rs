use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vplan_adapter::api::router;
use vplan_adapter::auth::TokenGate;
use vplan_adapter::config::AppConfig;
use vplan_adapter::services::{PurgeScheduler, SnapshotStore};
use vplan_adapter::state::AppState;
use vplan_adapter::upstream::HttpPlanSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "vplan_adapter=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let source = Arc::new(HttpPlanSource::new(config.upstream.clone())?);
    let store = Arc::new(SnapshotStore::new(source, config.store.clone()));

    let scheduler = PurgeScheduler::new(store.clone(), config.purge_interval);
    tokio::spawn(scheduler.start());

    if config.api_tokens.is_empty() && config.admin_tokens.is_empty() {
        tracing::warn!("no API tokens configured, every query will be rejected");
    }

    let state = AppState {
        store,
        gate: Arc::new(TokenGate::new(config.api_tokens, config.admin_tokens)),
    };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
