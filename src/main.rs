use std::net::SocketAddr;
use std::sync::Arc;
use emotion_ai_server::utils::config::Config;
use emotion_ai_server::utils::logging;
use emotion_ai_server::{api, pipeline, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();
    info!(?cfg, "starting emotion analysis server");

    // Decided once; the handlers never re-check which strategy is in use.
    let selection = pipeline::load_classifier(&cfg).await;
    info!(
        classifier = selection.classifier.name(),
        model_available = selection.model_available,
        "classifier selected"
    );

    let state = Arc::new(AppState::new(selection, cfg.max_body_bytes));
    let app = api::routes::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
