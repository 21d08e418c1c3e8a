use serde::Serialize;

/// Lifecycle of one recording attempt.
///
/// This is the only authoritative state; every boolean the UI needs is a
/// projection of the current variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing held
    #[default]
    Idle,
    /// Microphone stream acquired, encoder not yet attached
    Armed,
    /// Encoder producing chunks
    Recording,
    /// Encoder suspended in place
    Paused,
    /// Encoder flushing, accumulator finalizing
    Stopping,
    /// Artifact available
    Stopped,
    /// Device failure; only reset leaves this state
    Failed { reason: String },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Armed => "armed",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
            SessionState::Failed { .. } => "failed",
        }
    }

    /// True while audio is being captured or could be resumed
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording | SessionState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, SessionState::Paused)
    }

    pub fn can_stop(&self) -> bool {
        self.is_recording()
    }

    pub fn has_artifact(&self) -> bool {
        matches!(self, SessionState::Stopped)
    }

    /// Anything other than `Idle` still holds work a user could lose
    pub fn is_unfinished(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            SessionState::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Failed { reason } => write!(f, "failed ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}
