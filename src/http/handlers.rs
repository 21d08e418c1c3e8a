use super::state::AppState;
use crate::error::{CaptureError, RecorderError};
use crate::handoff::{PersistedRecording, ProgressCallback, RecordingDraft};
use crate::session::{
    ArtifactInfo, CaptureConfig, ConfirmationGate, DestructiveAction, SessionStats, StaticGate,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartRecordingRequest {
    /// Discard an unsaved recording if there is one
    #[serde(default)]
    pub confirm_discard: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub noise_cancellation: bool,
}

#[derive(Debug, Deserialize)]
pub struct SaveRecordingRequest {
    pub title: String,
    #[serde(default)]
    pub notes: String,
    /// Defaults to what the session was armed with
    pub noise_cancellation: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub stats: SessionStats,
    pub upload_progress: u8,
    /// A save of this (or another) session is uploading
    pub uploading: bool,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub status: String,
    pub message: String,
    pub artifact: ArtifactInfo,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct SaveRecordingResponse {
    pub status: String,
    pub lecture: PersistedRecording,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Map a session/handoff error to its HTTP status
fn error_response(err: &RecorderError) -> Response {
    let status = match err {
        RecorderError::Capture(CaptureError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
        RecorderError::Capture(CaptureError::DeviceNotFound(_)) => StatusCode::NOT_FOUND,
        RecorderError::Capture(CaptureError::CaptureInit(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        RecorderError::EmptySession | RecorderError::InvalidDraft(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RecorderError::StateViolation { .. } | RecorderError::DiscardDeclined => {
            StatusCode::CONFLICT
        }
        RecorderError::UploadFailure(_) => StatusCode::BAD_GATEWAY,
    };
    error_body(status, err.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /recording/status
/// Current session stats and upload progress
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    session.sync();

    Json(StatusResponse {
        stats: session.stats(),
        upload_progress: state.upload_progress.load(Ordering::Relaxed),
        uploading: state.handoff_in_flight().is_some(),
    })
}

/// GET /recording/levels
/// Latest visualization snapshot
pub async fn get_levels(State(state): State<AppState>) -> impl IntoResponse {
    let levels = state.session.lock().await.levels();
    let snapshot = levels.borrow().clone();
    Json(snapshot)
}

/// PUT /recording/settings
/// Capture options for the next session
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    session.set_noise_cancellation(req.noise_cancellation);
    let settings: CaptureConfig = session.capture_config().clone();
    Json(settings)
}

/// POST /recording/start
/// Start a new recording, discarding an unsaved one only when confirmed
pub async fn start_recording(
    State(state): State<AppState>,
    body: Option<Json<StartRecordingRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let gate = StaticGate(req.confirm_discard);

    let mut session = state.session.lock().await;
    match session.start_new(&gate).await {
        Ok(()) => {
            state.upload_progress.store(0, Ordering::Relaxed);
            (StatusCode::OK, Json(session.stats())).into_response()
        }
        Err(e) => {
            warn!("Failed to start recording: {}", e);
            error_response(&e)
        }
    }
}

/// POST /recording/pause
pub async fn pause_recording(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    match session.pause() {
        Ok(()) => (StatusCode::OK, Json(session.stats())).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /recording/resume
pub async fn resume_recording(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.lock().await;
    match session.resume() {
        Ok(()) => (StatusCode::OK, Json(session.stats())).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /recording/stop
/// Stop recording and assemble the artifact
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.lock().await;

    match session.stop().await.map(|artifact| artifact.info()) {
        Ok(artifact) => {
            info!(
                "Recording stopped: {} ({} bytes)",
                artifact.duration_label, artifact.size_bytes
            );
            (
                StatusCode::OK,
                Json(StopRecordingResponse {
                    status: "stopped".to_string(),
                    message: format!("Recording stopped at {}", artifact.duration_label),
                    artifact,
                    stats: session.stats(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to stop recording: {}", e);
            error_response(&e)
        }
    }
}

/// POST /recording/discard
/// Throw away the current recording
pub async fn discard_recording(
    State(state): State<AppState>,
    body: Option<Json<ConfirmRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let mut session = state.session.lock().await;
    match session.discard(&StaticGate(req.confirm)).await {
        Ok(()) => {
            state.upload_progress.store(0, Ordering::Relaxed);
            (StatusCode::OK, Json(session.stats())).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// GET /recording/preview
/// WAV rendition of the stopped recording
pub async fn get_preview(State(state): State<AppState>) -> impl IntoResponse {
    let artifact = {
        let session = state.session.lock().await;
        match session.artifact() {
            Some(artifact) => artifact.clone(),
            None => return error_body(StatusCode::NOT_FOUND, "No finished recording"),
        }
    };

    match artifact.to_wav() {
        Ok(wav) => ([(header::CONTENT_TYPE, "audio/wav")], wav).into_response(),
        Err(e) => {
            error!("Failed to render preview: {:#}", e);
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render preview: {}", e),
            )
        }
    }
}

/// POST /recording/save
/// Upload the stopped recording; the session is released once it is stored
pub async fn save_recording(
    State(state): State<AppState>,
    Json(req): Json<SaveRecordingRequest>,
) -> impl IntoResponse {
    // Upload outside the lock so status polling keeps working
    let (artifact, session_id, armed_with_noise_cancellation, _claim) = {
        let mut session = state.session.lock().await;
        session.sync();
        let (artifact, id) = match (session.artifact(), session.session_id()) {
            (Some(artifact), Some(id)) => (artifact, id),
            _ => {
                return error_response(&RecorderError::StateViolation {
                    action: "save",
                    state: session.state().label(),
                })
            }
        };
        let Some(claim) = state.claim_handoff(id) else {
            warn!("Save of session {} rejected; an upload is already running", id);
            return error_response(&RecorderError::StateViolation {
                action: "save",
                state: "uploading",
            });
        };
        (
            artifact.clone(),
            id,
            session
                .constraints_used()
                .is_some_and(|c| !c.vendor_hints.is_empty()),
            claim,
        )
    };

    let draft = RecordingDraft::new(req.title)
        .with_notes(req.notes)
        .with_noise_cancellation(
            req.noise_cancellation
                .unwrap_or(armed_with_noise_cancellation),
        );

    let progress_state = Arc::clone(&state.upload_progress);
    let progress: ProgressCallback = Arc::new(move |percent| {
        progress_state.store(percent, Ordering::Relaxed);
    });

    match state.handoff.submit(&artifact, &draft, progress).await {
        Ok(lecture) => {
            let released = state.session.lock().await.complete_handoff(session_id);
            if !released {
                warn!("Session {} changed during upload; left as is", session_id);
            }
            (
                StatusCode::OK,
                Json(SaveRecordingResponse {
                    status: "saved".to_string(),
                    lecture,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// GET /lectures
/// Library listing from persistence
pub async fn list_lectures(State(state): State<AppState>) -> impl IntoResponse {
    match state.handoff.persistence().list().await {
        Ok(lectures) => (StatusCode::OK, Json(lectures)).into_response(),
        Err(e) => {
            error!("Failed to list lectures: {:#}", e);
            error_body(StatusCode::BAD_GATEWAY, format!("{:#}", e))
        }
    }
}

/// DELETE /lectures/:id
/// Remove a lecture; requires confirmation
pub async fn delete_lecture(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ConfirmRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let action = DestructiveAction::DeleteLecture { id: id.clone() };

    if !StaticGate(req.confirm).confirm(&action).await {
        info!("Deletion of lecture {} not confirmed", id);
        return error_body(StatusCode::CONFLICT, action.prompt());
    }

    match state.handoff.persistence().delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete lecture {}: {:#}", id, e);
            error_body(StatusCode::BAD_GATEWAY, format!("{:#}", e))
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
