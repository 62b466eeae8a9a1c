use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gatewatch::history::HistoryClient;
use gatewatch::ingest::IngestPipeline;
use gatewatch::mqtt_link::MqttLink;
use gatewatch::web_api::create_router;
use gatewatch::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatewatch=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        mqtt_host = %config.mqtt_host,
        mqtt_port = config.mqtt_port,
        backend = config.backend_url.as_deref().unwrap_or("(none)"),
        "Starting gatewatch"
    );

    let link = MqttLink::connect(config.mqtt_link_config());
    let state = AppState::new(config.clone(), link.clone());

    let pipeline = IngestPipeline::new(
        link,
        state.normalizer.clone(),
        state.window.clone(),
        state.devices.clone(),
    );

    tokio::spawn(async move {
        if let Err(e) = pipeline.run().await {
            tracing::error!(error = %e, "Ingest pipeline exited");
        }
    });

    // Backfill runs concurrently with live ingestion; the merge produces the
    // same window whichever side completes first
    match config.backend_url.clone() {
        Some(base_url) => {
            let history = HistoryClient::new(base_url, state.normalizer.clone());
            let window = state.window.clone();
            let per_page = config.history_per_page;
            let deadline = config.history_deadline();
            tokio::spawn(async move {
                history.backfill(&window, per_page, deadline).await;
            });
        }
        None => tracing::info!("No backend configured, running live-only"),
    }

    let app = create_router(state);
    let addr = config.bind_addr();
    tracing::info!(addr = %addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
