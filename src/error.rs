use thiserror::Error;

/// Errors a capture device reports when asked for a stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The user or platform refused microphone access
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No input device matched the request
    #[error("no capture device found: {0}")]
    DeviceNotFound(String),

    /// The platform failed to start capture for any other reason
    #[error("failed to initialize capture: {0}")]
    CaptureInit(String),
}

/// Errors surfaced by the capture session and the handoff boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Stop was requested but no tick ever produced audio
    #[error("recording produced no audio data")]
    EmptySession,

    /// A transition was requested from a state that does not allow it
    #[error("cannot {action} while {state}")]
    StateViolation {
        action: &'static str,
        state: &'static str,
    },

    /// The confirmation gate refused a destructive action
    #[error("discard was not confirmed")]
    DiscardDeclined,

    /// Draft metadata failed local validation
    #[error("invalid recording draft: {0}")]
    InvalidDraft(String),

    /// The persistence collaborator rejected or never completed the upload
    #[error("upload failed: {0}")]
    UploadFailure(String),
}

impl RecorderError {
    /// True for failures caused by the user or environment rather than the caller
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            RecorderError::Capture(CaptureError::PermissionDenied(_))
                | RecorderError::Capture(CaptureError::DeviceNotFound(_))
                | RecorderError::InvalidDraft(_)
                | RecorderError::UploadFailure(_)
        )
    }
}
