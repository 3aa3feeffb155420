use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::common::{RoomId, now_ms};
use crate::protocol::RoomMemberInfo;
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOverview {
    pub id: RoomId,
    pub user_count: usize,
    pub users: Vec<RoomMemberInfo>,
    pub is_recording: bool,
    pub last_activity: u64,
}

#[derive(Debug, Serialize)]
pub struct RoomList {
    pub rooms: Vec<RoomOverview>,
}

/// GET /api/rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<RoomList> {
    tracing::debug!("GET /api/rooms");
    let mut rooms = Vec::new();
    for room in state.rooms.snapshot() {
        let room = room.lock().await;
        rooms.push(RoomOverview {
            id: room.id.clone(),
            user_count: room.member_count(),
            users: room.member_infos(),
            is_recording: room.is_recording(),
            last_activity: room.last_activity,
        });
    }
    Json(RoomList { rooms })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub timestamp: u64,
    pub active_rooms: usize,
    pub total_connections: usize,
    pub recordings_directory: String,
    pub rooms: Vec<HealthRoom>,
}

#[derive(Debug, Serialize)]
pub struct HealthRoom {
    pub id: RoomId,
    pub users: usize,
    pub recording: bool,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    tracing::debug!("GET /health");
    let mut rooms = Vec::new();
    for room in state.rooms.snapshot() {
        let room = room.lock().await;
        rooms.push(HealthRoom {
            id: room.id.clone(),
            users: room.member_count(),
            recording: room.is_recording(),
        });
    }
    Json(Health {
        status: "ok",
        timestamp: now_ms(),
        active_rooms: state.rooms.len(),
        total_connections: state.registry.connection_count(),
        recordings_directory: state.config.recording.directory.clone(),
        rooms,
    })
}
