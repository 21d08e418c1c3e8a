use serde::Serialize;
use uuid::Uuid;

/// A destructive action that needs the user's consent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DestructiveAction {
    /// Throw away the current, not yet saved recording
    DiscardRecording { session_id: Option<Uuid> },
    /// Remove a lecture from the library
    DeleteLecture { id: String },
}

impl DestructiveAction {
    pub fn prompt(&self) -> String {
        match self {
            DestructiveAction::DiscardRecording { .. } => {
                "You have an unsaved recording. Discard it?".to_string()
            }
            DestructiveAction::DeleteLecture { id } => {
                format!("Delete lecture {} permanently?", id)
            }
        }
    }
}

/// Yes/no check run before a destructive action.
///
/// Whatever decides (a dialog, a password prompt, an authorization
/// service) lives behind this trait; callers only see the answer.
#[async_trait::async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, action: &DestructiveAction) -> bool;
}

/// Gate with a fixed answer, e.g. a confirmation already collected by a UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticGate(pub bool);

impl StaticGate {
    pub const APPROVE: StaticGate = StaticGate(true);
    pub const DECLINE: StaticGate = StaticGate(false);
}

#[async_trait::async_trait]
impl ConfirmationGate for StaticGate {
    async fn confirm(&self, _action: &DestructiveAction) -> bool {
        self.0
    }
}
