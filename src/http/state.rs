use crate::handoff::HandoffBoundary;
use crate::session::CaptureSession;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single capture session; the lock serializes transitions
    pub session: Arc<Mutex<CaptureSession>>,

    /// Where saved lectures go
    pub handoff: HandoffBoundary,

    /// Progress of the running (or last) upload, 0-100
    pub upload_progress: Arc<AtomicU8>,

    /// Session whose recording is being uploaded right now
    handoff_in_flight: Arc<std::sync::Mutex<Option<Uuid>>>,
}

impl AppState {
    pub fn new(session: CaptureSession, handoff: HandoffBoundary) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            handoff,
            upload_progress: Arc::new(AtomicU8::new(0)),
            handoff_in_flight: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Mark `session_id` as uploading. `None` when an upload is already running.
    pub fn claim_handoff(&self, session_id: Uuid) -> Option<HandoffClaim> {
        let mut slot = self
            .handoff_in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return None;
        }
        *slot = Some(session_id);
        Some(HandoffClaim {
            slot: Arc::clone(&self.handoff_in_flight),
        })
    }

    pub fn handoff_in_flight(&self) -> Option<Uuid> {
        *self
            .handoff_in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the in-flight marker when the upload finishes or is abandoned
pub struct HandoffClaim {
    slot: Arc<std::sync::Mutex<Option<Uuid>>>,
}

impl Drop for HandoffClaim {
    fn drop(&mut self) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}
