use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::common::{ConnectionId, RoomError, RoomId, UserId, now_ms};
use crate::protocol::{IncomingMessage, OutgoingMessage};
use crate::server::AppState;
use crate::ws::signaling::{self, SignalKind};

/// Dispatches one validated client message.
///
/// Every branch converts failure into a typed response for the caller;
/// nothing here may leave room state half-mutated or panic the socket task.
pub async fn handle_op(op: IncomingMessage, state: &Arc<AppState>, conn_id: &ConnectionId) {
    match op {
        IncomingMessage::JoinRoom { room_id, user_id } => {
            handle_join(state, conn_id, room_id, user_id).await;
        }
        IncomingMessage::LeaveRoom { room_id, user_id } => {
            info!("User {} leaving room {}", user_id, room_id);
            remove_from_room(state, conn_id, &room_id, &user_id, None).await;
            state.registry.unbind(conn_id);
        }
        IncomingMessage::StartRecording { room_id } => {
            handle_start_recording(state, conn_id, room_id).await;
        }
        IncomingMessage::StopRecording { room_id } => {
            handle_stop_recording(state, conn_id, room_id).await;
        }
        IncomingMessage::AudioChunk {
            room_id,
            audio_data,
            chunk_index,
        } => {
            handle_audio_chunk(state, conn_id, room_id, audio_data, chunk_index).await;
        }
        IncomingMessage::GetRecording { room_id, user_id } => {
            handle_get_recording(state, conn_id, room_id, user_id).await;
        }
        IncomingMessage::GetRecordingStatus { room_id } => {
            handle_recording_status(state, conn_id, room_id).await;
        }
        IncomingMessage::WebrtcOffer {
            room_id,
            target_user_id,
            payload,
        } => {
            signaling::relay(state, conn_id, SignalKind::Offer, room_id, target_user_id, payload)
                .await;
        }
        IncomingMessage::WebrtcAnswer {
            room_id,
            target_user_id,
            payload,
        } => {
            signaling::relay(state, conn_id, SignalKind::Answer, room_id, target_user_id, payload)
                .await;
        }
        IncomingMessage::WebrtcIceCandidate {
            room_id,
            target_user_id,
            payload,
        } => {
            signaling::relay(
                state,
                conn_id,
                SignalKind::IceCandidate,
                room_id,
                target_user_id,
                payload,
            )
            .await;
        }
        IncomingMessage::GetRoomInfo { room_id } => {
            handle_room_info(state, conn_id, room_id).await;
        }
    }
}

async fn handle_join(state: &Arc<AppState>, conn_id: &ConnectionId, room_id: RoomId, user_id: UserId) {
    if room_id.is_empty() || user_id.is_empty() {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::RoomJoinError {
                error: RoomError::Validation("roomId or userId").to_string(),
            },
        );
        return;
    }

    info!("User {} attempting to join room {}", user_id, room_id);

    // Rebinding atomically displaces the previous binding; joining while in
    // another room is a move, not an error.
    let displaced = state
        .registry
        .bind(conn_id.clone(), user_id.clone(), room_id.clone());
    // Same connection, same identity: the add below just refreshes the
    // member entry. Anything else leaves the old membership behind first,
    // including a same-room rejoin under a new user id.
    if let Some(old) = displaced
        && (old.room_id != room_id || old.user_id != user_id)
    {
        info!(
            "User {} already in room {}, leaving first",
            old.user_id, old.room_id
        );
        remove_from_room(state, conn_id, &old.room_id, &old.user_id, None).await;
    }

    let room = state.rooms.get_or_create(&room_id);
    let mut room = room.lock().await;
    room.add_member(user_id.clone(), conn_id.clone());

    let all_members = room.member_infos();
    let others: Vec<_> = all_members
        .iter()
        .filter(|m| m.user_id != user_id)
        .cloned()
        .collect();
    let other_conns: Vec<ConnectionId> = others.iter().map(|m| m.socket_id.clone()).collect();
    let all_conns: Vec<ConnectionId> = room
        .members()
        .iter()
        .map(|m| m.connection_id.clone())
        .collect();
    let total_users = room.member_count();
    let is_recording = room.is_recording();
    drop(room);

    state.registry.emit_to_all(
        other_conns.iter(),
        &OutgoingMessage::UserJoined {
            user_id: user_id.clone(),
            socket_id: conn_id.clone(),
            timestamp: now_ms(),
        },
    );

    state.registry.emit(
        conn_id,
        &OutgoingMessage::RoomJoined {
            success: true,
            room_id: room_id.clone(),
            user_id: user_id.clone(),
            users: others,
            is_recording,
            total_users,
            timestamp: now_ms(),
        },
    );

    info!(
        "User {} joined room {}. Total users: {}",
        user_id, room_id, total_users
    );

    state.registry.emit_to_all(
        all_conns.iter(),
        &OutgoingMessage::RoomUpdated {
            room_id,
            total_users,
            users: all_members,
        },
    );
}

/// Shared removal path for leave, disconnect and join-as-move.
///
/// Finalizes the leaver's recorder (via the room), notifies the remaining
/// members, and tears the room down when it empties: an active session is
/// force-stopped and its summary persisted before deletion.
async fn remove_from_room(
    state: &Arc<AppState>,
    conn_id: &ConnectionId,
    room_id: &RoomId,
    user_id: &UserId,
    reason: Option<&str>,
) {
    let Some(room) = state.rooms.get(room_id) else {
        return;
    };

    let mut room = room.lock().await;
    let removed = room.remove_member(user_id, &state.store).await;

    if removed {
        let remaining = room.member_infos();
        let remaining_conns: Vec<ConnectionId> =
            remaining.iter().map(|m| m.socket_id.clone()).collect();

        state.registry.emit_to_all_except(
            remaining_conns.iter(),
            conn_id,
            &OutgoingMessage::UserLeft {
                user_id: user_id.clone(),
                reason: reason.map(String::from),
                timestamp: now_ms(),
                remaining_users: remaining.len(),
            },
        );
        state.registry.emit_to_all(
            remaining_conns.iter(),
            &OutgoingMessage::RoomUpdated {
                room_id: room_id.clone(),
                total_users: remaining.len(),
                users: remaining,
            },
        );
    }

    if room.is_empty() {
        if room.is_recording() {
            info!("Stopping recording for empty room {}", room_id);
            match room.stop_recording(&state.store).await {
                Ok((summary, _)) => {
                    if summary.total_size > 0 {
                        info!(
                            "Final recordings saved for {}: {} files, {} bytes",
                            room_id, summary.total_files, summary.total_size
                        );
                    }
                }
                Err(e) => warn!("Failed to stop recording for empty room {}: {}", room_id, e),
            }
        }
        drop(room);
        state.rooms.delete_if_empty(room_id);
    }
}

/// Disconnect carries the same semantics as an explicit leave.
pub async fn handle_disconnect(state: &Arc<AppState>, conn_id: &ConnectionId) {
    let Some(binding) = state.registry.unbind(conn_id) else {
        return;
    };
    remove_from_room(
        state,
        conn_id,
        &binding.room_id,
        &binding.user_id,
        Some("disconnect"),
    )
    .await;
}

async fn handle_start_recording(state: &Arc<AppState>, conn_id: &ConnectionId, room_id: RoomId) {
    info!("Start recording request for room {}", room_id);

    let Some(room) = state.rooms.get(&room_id) else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::RecordingStartResponse {
                success: false,
                session_id: None,
                message: None,
                error: Some(RoomError::RoomNotFound.to_string()),
            },
        );
        return;
    };

    let mut room = room.lock().await;
    match room.start_recording(&state.store, &state.config.recording) {
        Ok(session_id) => {
            let total_users = room.member_count();
            let conns: Vec<ConnectionId> = room
                .members()
                .iter()
                .map(|m| m.connection_id.clone())
                .collect();
            drop(room);

            state.registry.emit_to_all(
                conns.iter(),
                &OutgoingMessage::RecordingStarted {
                    room_id,
                    session_id: session_id.clone(),
                    timestamp: now_ms(),
                },
            );
            state.registry.emit(
                conn_id,
                &OutgoingMessage::RecordingStartResponse {
                    success: true,
                    session_id: Some(session_id),
                    message: Some(format!(
                        "Started recording session for {total_users} users"
                    )),
                    error: None,
                },
            );
        }
        Err(e) => {
            state.registry.emit(
                conn_id,
                &OutgoingMessage::RecordingStartResponse {
                    success: false,
                    session_id: None,
                    message: None,
                    error: Some(e.to_string()),
                },
            );
        }
    }
}

async fn handle_stop_recording(state: &Arc<AppState>, conn_id: &ConnectionId, room_id: RoomId) {
    info!("Stop recording request for room {}", room_id);

    let Some(room) = state.rooms.get(&room_id) else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::RecordingStopResponse {
                success: false,
                session: None,
                user_recordings: None,
                message: None,
                error: Some(RoomError::RoomNotFound.to_string()),
            },
        );
        return;
    };

    let mut room = room.lock().await;
    match room.stop_recording(&state.store).await {
        Ok((summary, results)) => {
            let conns: Vec<ConnectionId> = room
                .members()
                .iter()
                .map(|m| m.connection_id.clone())
                .collect();
            drop(room);

            state.registry.emit_to_all(
                conns.iter(),
                &OutgoingMessage::RecordingStopped {
                    room_id,
                    session_id: summary.session_id.clone(),
                    user_recordings: summary.user_recordings.clone(),
                    total_files: summary.total_files,
                    total_size: summary.total_size,
                },
            );
            let message = format!(
                "Stopped recording session. Created {} individual recordings.",
                results.len()
            );
            state.registry.emit(
                conn_id,
                &OutgoingMessage::RecordingStopResponse {
                    success: true,
                    session: Some(summary),
                    user_recordings: Some(results),
                    message: Some(message),
                    error: None,
                },
            );
        }
        Err(e) => {
            state.registry.emit(
                conn_id,
                &OutgoingMessage::RecordingStopResponse {
                    success: false,
                    session: None,
                    user_recordings: None,
                    message: None,
                    error: Some(e.to_string()),
                },
            );
        }
    }
}

async fn handle_audio_chunk(
    state: &Arc<AppState>,
    conn_id: &ConnectionId,
    room_id: RoomId,
    audio_data: String,
    chunk_index: Option<u64>,
) {
    let Some(binding) = state.registry.lookup(conn_id) else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::AudioChunkReceived {
                success: false,
                chunk_index: None,
                total_chunks: None,
                user_id: None,
                error: Some("User not found in room".to_string()),
            },
        );
        return;
    };
    let user_id = binding.user_id;

    let Some(room) = state.rooms.get(&room_id) else {
        debug!("Audio chunk for unknown room {}", room_id);
        return;
    };

    let mut room = room.lock().await;
    room.touch();

    if !room.is_recording() {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::AudioChunkReceived {
                success: false,
                chunk_index: None,
                total_chunks: None,
                user_id: None,
                error: Some("Recording not active".to_string()),
            },
        );
        return;
    }

    let ack = BASE64
        .decode(&audio_data)
        .ok()
        .and_then(|bytes| room.append_chunk(&user_id, Bytes::from(bytes), chunk_index, &state.store));

    let Some(ack) = ack else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::AudioChunkReceived {
                success: false,
                chunk_index: None,
                total_chunks: None,
                user_id: Some(user_id),
                error: Some("Failed to add audio chunk".to_string()),
            },
        );
        return;
    };

    // Unbounded buffering is capped per recorder; a breach saves what we
    // have instead of growing without limit.
    if room.recorder_over_cap(&user_id) {
        warn!(
            "Recorder byte cap exceeded for user {} in room {}",
            user_id, room_id
        );
        room.finalize_recorder(&user_id, &state.store).await;
    }

    let other_conns: Vec<ConnectionId> = room
        .members()
        .iter()
        .map(|m| m.connection_id.clone())
        .collect();
    drop(room);

    state.registry.emit(
        conn_id,
        &OutgoingMessage::AudioChunkReceived {
            success: true,
            chunk_index: Some(ack.chunk_index),
            total_chunks: Some(ack.total_chunks),
            user_id: Some(user_id.clone()),
            error: None,
        },
    );

    // Live relay to the rest of the room, payload passed through as-is.
    state.registry.emit_to_all_except(
        other_conns.iter(),
        conn_id,
        &OutgoingMessage::AudioData {
            user_id,
            audio_data,
        },
    );
}

async fn handle_get_recording(
    state: &Arc<AppState>,
    conn_id: &ConnectionId,
    room_id: RoomId,
    requested_user_id: Option<UserId>,
) {
    let Some(binding) = state.registry.lookup(conn_id) else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::GetRecordingResponse {
                success: false,
                user_id: None,
                audio_data: None,
                size: 0,
                chunks: 0,
                mime_type: None,
                message: None,
                error: Some("User not found".to_string()),
            },
        );
        return;
    };
    let target_user_id = requested_user_id.unwrap_or(binding.user_id);
    info!(
        "Get recording request for room {}, user {}",
        room_id, target_user_id
    );

    let Some(room) = state.rooms.get(&room_id) else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::GetRecordingResponse {
                success: false,
                user_id: None,
                audio_data: None,
                size: 0,
                chunks: 0,
                mime_type: None,
                message: None,
                error: Some(RoomError::RoomNotFound.to_string()),
            },
        );
        return;
    };

    let room = room.lock().await;
    let data = room.recording_data(&target_user_id);
    drop(room);

    let mime_type = state.config.recording.mime_type.clone();
    let msg = match data {
        Some(data) => OutgoingMessage::GetRecordingResponse {
            success: true,
            user_id: Some(data.user_id.clone()),
            audio_data: Some(data.audio_data),
            size: data.size,
            chunks: data.chunks,
            mime_type: Some(mime_type),
            message: Some(format!("Recording data for user {target_user_id}")),
            error: None,
        },
        None => OutgoingMessage::GetRecordingResponse {
            success: true,
            user_id: Some(target_user_id.clone()),
            audio_data: None,
            size: 0,
            chunks: 0,
            mime_type: Some(mime_type),
            message: Some(format!("No recording data for user {target_user_id}")),
            error: None,
        },
    };
    state.registry.emit(conn_id, &msg);
}

async fn handle_recording_status(state: &Arc<AppState>, conn_id: &ConnectionId, room_id: RoomId) {
    let Some(room) = state.rooms.get(&room_id) else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::RecordingStatusResponse {
                success: false,
                room_id: None,
                status: None,
                error: Some(RoomError::RoomNotFound.to_string()),
            },
        );
        return;
    };

    let room = room.lock().await;
    let status = room.recording_status();
    drop(room);

    state.registry.emit(
        conn_id,
        &OutgoingMessage::RecordingStatusResponse {
            success: true,
            room_id: Some(room_id),
            status: Some(status),
            error: None,
        },
    );
}

async fn handle_room_info(state: &Arc<AppState>, conn_id: &ConnectionId, room_id: RoomId) {
    let Some(room) = state.rooms.get(&room_id) else {
        state.registry.emit(
            conn_id,
            &OutgoingMessage::RoomInfoResponse {
                room_id: None,
                users: None,
                total_users: None,
                is_recording: None,
                error: Some(RoomError::RoomNotFound.to_string()),
            },
        );
        return;
    };

    let room = room.lock().await;
    let msg = OutgoingMessage::RoomInfoResponse {
        room_id: Some(room.id.clone()),
        users: Some(room.member_infos()),
        total_users: Some(room.member_count()),
        is_recording: Some(room.is_recording()),
        error: None,
    };
    drop(room);

    state.registry.emit(conn_id, &msg);
}
