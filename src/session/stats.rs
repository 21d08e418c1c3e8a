use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::artifact::ArtifactInfo;
use super::config::CaptureConfig;
use crate::audio::CaptureConstraints;

/// Point-in-time view of a capture session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Current session, if one was armed since the last reset
    pub session_id: Option<Uuid>,

    /// Lifecycle state label (`idle`, `recording`, ...)
    pub state: &'static str,

    /// Why the session failed, only present in the failed state
    pub failure_reason: Option<String>,

    /// Whether recording is currently active (recording or paused)
    pub is_recording: bool,

    /// Whether recording is paused
    pub is_paused: bool,

    /// When the session was armed (wall clock)
    pub started_at: Option<DateTime<Utc>>,

    /// Recorded time in seconds, pauses excluded
    pub elapsed_secs: f64,

    /// Recorded time as `MM:SS` / `HH:MM:SS`
    pub elapsed_label: String,

    /// Number of audio chunks received so far
    pub chunks_count: usize,

    /// Bytes held by the chunk buffer
    pub buffered_bytes: usize,

    /// Constraints the current session was armed with
    pub constraints_used: Option<CaptureConstraints>,

    /// Options the next session will be armed with
    pub pending_capture: CaptureConfig,

    /// Finished recording, only present when stopped
    pub artifact: Option<ArtifactInfo>,
}
