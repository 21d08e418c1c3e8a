//! Recording session management
//!
//! This module provides the `CaptureSession` state machine that manages:
//! - Microphone stream acquisition with best-effort capture hints
//! - The record/pause/resume/stop lifecycle
//! - Encoding on a fixed tick and chunk accumulation
//! - Elapsed time that survives a throttled or suspended host
//! - Finalization into one artifact and handoff to persistence

mod artifact;
mod config;
mod gate;
mod pipeline;
mod session;
mod state;
mod stats;
mod timer;

pub use artifact::{Artifact, ArtifactInfo};
pub use config::{CaptureConfig, SessionConfig};
pub use gate::{ConfirmationGate, DestructiveAction, StaticGate};
pub use session::CaptureSession;
pub use state::SessionState;
pub use stats::SessionStats;
pub use timer::{format_duration, SessionTimer};
