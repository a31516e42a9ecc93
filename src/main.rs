use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outreach_wave::artifacts::HttpMessageSource;
use outreach_wave::config::CampaignConfig;
use outreach_wave::server::{AppState, build_router};
use outreach_wave::store::{Store, load_snapshot, shared};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outreach_wave=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CampaignConfig::from_env();

    let store = match load_snapshot(&config.snapshot_path)? {
        Some(store) => {
            tracing::info!(
                path = %config.snapshot_path.display(),
                contacts = store.contact_count(),
                interventions = store.intervention_count(),
                "loaded ledger snapshot"
            );
            store
        }
        None => {
            tracing::warn!(
                path = %config.snapshot_path.display(),
                "no snapshot found, starting with an empty ledger"
            );
            Store::new()
        }
    };

    let state = AppState::new(
        shared(store),
        config.clone(),
        Arc::new(HttpMessageSource::default()),
    );
    let app = build_router(state);

    tracing::info!(%config.listen_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
