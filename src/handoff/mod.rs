//! Handoff of finished recordings to persistence
//!
//! - `RecordingDraft`: user-entered title, notes and flags
//! - `HandoffBoundary`: validation, upload, progress reporting
//! - `LecturePersistence`: storage collaborator (HTTP backend or in-memory)

mod boundary;
mod draft;
mod http_client;
mod persistence;

pub use boundary::HandoffBoundary;
pub use draft::{RecordingDraft, UploadMetadata};
pub use http_client::{HttpPersistence, DEFAULT_UPLOAD_TIMEOUT};
pub use persistence::{
    no_progress, InMemoryLibrary, LecturePersistence, LectureSummary, PersistedRecording,
    ProgressCallback,
};
