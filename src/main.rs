use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tracing::info;
use voicelink::configs::Config;
use voicelink::server::AppState;
use voicelink::transport;
use voicelink::ws;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load()?;

    let default_level = config
        .logging
        .as_ref()
        .and_then(|l| l.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let directives = match config.logging.as_ref().and_then(|l| l.filters.clone()) {
        Some(filters) => format!("{default_level},{filters}"),
        None => default_level,
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directives));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let shared_state = Arc::new(AppState::new(config));
    shared_state.store.ensure_root()?;
    info!(
        "Recordings will be saved to: {}",
        shared_state.config.recording.directory
    );

    let app = Router::new()
        .route("/ws", get(ws::websocket_handler))
        .with_state(shared_state.clone())
        .merge(transport::http_server::router(shared_state.clone()))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let address: SocketAddr = format!(
        "{}:{}",
        shared_state.config.server.host, shared_state.config.server.port
    )
    .parse()?;
    info!("Voice room server listening on {}", address);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, shutting down gracefully");
}
