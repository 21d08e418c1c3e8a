use anyhow::{Context, Result};
use clap::Parser;
use lecture_recorder::{
    create_router, AppState, CaptureDeviceFactory, CaptureSession, CaptureSource, Config,
    HandoffBoundary, HttpPersistence, InMemoryLibrary, LecturePersistence,
};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "lecture-recorder")]
#[command(about = "Record lectures and hand them off to the lecture library")]
struct Args {
    /// Configuration file (without extension)
    #[arg(short, long, default_value = "config/lecture-recorder")]
    config: String,

    /// Capture source: synthetic, microphone or file (overrides config)
    #[arg(short, long)]
    source: Option<String>,

    /// Device name or WAV path for the capture source
    #[arg(short, long)]
    input: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut cfg = Config::load(&args.config)?;
    if let Some(source) = args.source {
        cfg.capture.source = source;
    }
    if let Some(input) = args.input {
        cfg.capture.input = Some(input);
    }

    info!("Lecture Recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let source = cfg.capture_source()?;
    if let CaptureSource::File(path) = &source {
        info!("Replaying {}", path.display());
    }
    let device = CaptureDeviceFactory::create(source)?;
    let session = CaptureSession::new(cfg.session_config(), device);

    let persistence: Arc<dyn LecturePersistence> = match &cfg.persistence.base_url {
        Some(base_url) => Arc::new(HttpPersistence::new(base_url, cfg.upload_timeout())?),
        None => {
            info!("No lecture backend configured; keeping recordings in memory");
            Arc::new(InMemoryLibrary::new())
        }
    };

    let state = AppState::new(session, HandoffBoundary::new(persistence));
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Release the microphone before exiting
    state.session.lock().await.reset();
    info!("Shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown requested");
}
