//! HTTP API server for the recorder UI
//!
//! This module provides a REST API around the single capture session:
//! - GET /recording/status, /recording/levels - Session state and visualization
//! - PUT /recording/settings - Noise cancellation for the next session
//! - POST /recording/{start,pause,resume,stop,discard} - Lifecycle control
//! - GET /recording/preview - WAV preview of the stopped recording
//! - POST /recording/save - Hand the recording off to persistence
//! - GET /lectures, DELETE /lectures/:id - Library browsing
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
