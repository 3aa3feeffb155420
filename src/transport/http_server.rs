use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::{
    server::AppState,
    transport::routes::{recordings, rooms},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/rooms", get(rooms::list_rooms))
        .route("/api/recordings", get(recordings::list_recordings))
        .route("/api/recordings/sessions", get(recordings::list_sessions))
        .route(
            "/api/recordings/session/{session_id}",
            get(recordings::get_session),
        )
        .route(
            "/api/recordings/{filename}",
            get(recordings::download_recording).delete(recordings::delete_recording),
        )
        .route("/health", get(rooms::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
