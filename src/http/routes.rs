use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session queries
        .route("/recording/status", get(handlers::get_status))
        .route("/recording/levels", get(handlers::get_levels))
        .route("/recording/settings", put(handlers::update_settings))
        // Recording control
        .route("/recording/start", post(handlers::start_recording))
        .route("/recording/pause", post(handlers::pause_recording))
        .route("/recording/resume", post(handlers::resume_recording))
        .route("/recording/stop", post(handlers::stop_recording))
        .route("/recording/discard", post(handlers::discard_recording))
        // Finished recording
        .route("/recording/preview", get(handlers::get_preview))
        .route("/recording/save", post(handlers::save_recording))
        // Library
        .route("/lectures", get(handlers::list_lectures))
        .route("/lectures/:id", delete(handlers::delete_lecture))
        // The recorder UI is served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
