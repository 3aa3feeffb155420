use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::common::{ApiError, RoomError, RoomId, SessionId};
use crate::protocol::{SessionSummary, UserRecordingInfo};
use crate::recording::{StoredFile, is_safe_filename};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct RecordingList {
    pub recordings: Vec<StoredFile>,
}

/// GET /api/recordings
pub async fn list_recordings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RecordingList>, (StatusCode, Json<ApiError>)> {
    tracing::debug!("GET /api/recordings");
    let recordings = state
        .store
        .list(&state.config.recording.file_extension)
        .await
        .map_err(|e| {
            tracing::error!("Error listing recordings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal(
                    "Failed to list recordings",
                    "/api/recordings",
                )),
            )
        })?;
    Ok(Json(RecordingList { recordings }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub start_time: String,
    pub end_time: String,
    pub duration: u64,
    pub total_files: usize,
    pub total_size: u64,
    pub user_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionOverview>,
}

/// GET /api/recordings/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionList>, (StatusCode, Json<ApiError>)> {
    tracing::debug!("GET /api/recordings/sessions");
    let summaries = state.store.list_summaries().await.map_err(|e| {
        tracing::error!("Error listing recording sessions: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(
                "Failed to list recording sessions",
                "/api/recordings/sessions",
            )),
        )
    })?;

    let sessions = summaries
        .into_iter()
        .map(|s| SessionOverview {
            session_id: s.session_id,
            room_id: s.room_id,
            start_time: s.start_time,
            end_time: s.end_time,
            duration: s.duration,
            total_files: s.total_files,
            total_size: s.total_size,
            user_count: s.user_recordings.len(),
        })
        .collect();
    Ok(Json(SessionList { sessions }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecording {
    #[serde(flatten)]
    pub info: UserRecordingInfo,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: SessionSummary,
    pub user_recordings: Vec<SessionRecording>,
    pub total_files: usize,
}

/// GET /api/recordings/session/{session_id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetail>, (StatusCode, Json<ApiError>)> {
    tracing::debug!("GET /api/recordings/session/{}", session_id);
    let path = format!("/api/recordings/session/{session_id}");

    let Some(summary) = state.store.read_summary(&session_id).await else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(
                RoomError::SessionNotFound.to_string(),
                path,
            )),
        ));
    };

    let mut user_recordings = Vec::with_capacity(summary.user_recordings.len());
    for info in &summary.user_recordings {
        let exists = state.store.file_size(&info.filename).await.is_some();
        user_recordings.push(SessionRecording {
            info: info.clone(),
            exists,
            download_url: exists.then(|| format!("/api/recordings/{}", info.filename)),
        });
    }

    let total_files = user_recordings.iter().filter(|r| r.exists).count();
    Ok(Json(SessionDetail {
        session: summary,
        user_recordings,
        total_files,
    }))
}

/// GET /api/recordings/{filename}
pub async fn download_recording(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    tracing::debug!("GET /api/recordings/{}", filename);
    let path = format!("/api/recordings/{filename}");

    if !is_safe_filename(&filename) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(
                RoomError::InvalidFilename.to_string(),
                path,
            )),
        ));
    }

    let data = state.store.read_file(&filename).await.map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(
                RoomError::RecordingNotFound.to_string(),
                path.clone(),
            )),
        )
    })?;

    let response = (
        [
            (
                header::CONTENT_TYPE,
                state.config.recording.mime_type.clone(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        data,
    )
        .into_response();
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// DELETE /api/recordings/{filename}
pub async fn delete_recording(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<ApiError>)> {
    tracing::debug!("DELETE /api/recordings/{}", filename);
    let path = format!("/api/recordings/{filename}");

    if !is_safe_filename(&filename) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(
                RoomError::InvalidFilename.to_string(),
                path,
            )),
        ));
    }

    match state.store.delete(&filename).await {
        Ok(()) => Ok(Json(DeleteResponse {
            success: true,
            message: "Recording deleted".to_string(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(
                RoomError::RecordingNotFound.to_string(),
                path,
            )),
        )),
        Err(e) => {
            tracing::error!("Error deleting recording {}: {}", filename, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::internal("Failed to delete recording", path)),
            ))
        }
    }
}
