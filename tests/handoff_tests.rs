// Integration tests for the handoff boundary and persistence clients
//
// The HTTP client is exercised against a small axum server bound to an
// ephemeral local port.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use lecture_recorder::handoff::{
    no_progress, HandoffBoundary, HttpPersistence, InMemoryLibrary, LecturePersistence,
    LectureSummary, PersistedRecording, ProgressCallback, RecordingDraft, UploadMetadata,
};
use lecture_recorder::session::Artifact;
use lecture_recorder::RecorderError;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn artifact(len: usize) -> Artifact {
    Artifact {
        data: Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>()),
        mime_type: "audio/L16;rate=48000;channels=1".to_string(),
        sample_rate: 48000,
        channels: 1,
        duration: Duration::from_secs(95),
        chunk_count: 95,
    }
}

fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |percent| {
        sink.lock().unwrap().push(percent);
    });
    (callback, seen)
}

/// Persistence that counts calls and fails every upload
#[derive(Default)]
struct Unreachable {
    uploads: AtomicUsize,
}

#[async_trait::async_trait]
impl LecturePersistence for Unreachable {
    async fn upload(
        &self,
        _metadata: &UploadMetadata,
        _artifact: &Artifact,
        progress: ProgressCallback,
    ) -> Result<PersistedRecording> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        progress(60);
        anyhow::bail!("network unreachable")
    }

    async fn list(&self) -> Result<Vec<LectureSummary>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_invalid_draft_never_reaches_persistence() {
    let persistence = Arc::new(Unreachable::default());
    let boundary = HandoffBoundary::new(persistence.clone());
    let (progress, seen) = recorder();

    let err = boundary
        .submit(&artifact(64), &RecordingDraft::new("   "), progress)
        .await
        .unwrap_err();

    assert!(matches!(err, RecorderError::InvalidDraft(_)));
    assert_eq!(persistence.uploads.load(Ordering::SeqCst), 0);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_upload_resets_progress() {
    let persistence = Arc::new(Unreachable::default());
    let boundary = HandoffBoundary::new(persistence.clone());
    let (progress, seen) = recorder();

    let err = boundary
        .submit(&artifact(64), &RecordingDraft::new("Phrasal verbs"), progress)
        .await
        .unwrap_err();

    assert_eq!(err, RecorderError::UploadFailure("network unreachable".into()));
    assert_eq!(*seen.lock().unwrap(), vec![0, 60, 0]);
    assert_eq!(persistence.uploads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_in_memory_library_round_trip() -> Result<()> {
    let library = Arc::new(InMemoryLibrary::new());
    let boundary = HandoffBoundary::new(library.clone());
    let (progress, seen) = recorder();
    let audio = artifact(1000);

    let saved = boundary
        .submit(
            &audio,
            &RecordingDraft::new("Conditionals")
                .with_notes("Type 2 and 3")
                .with_noise_cancellation(true),
            progress,
        )
        .await?;

    assert_eq!(saved.id, "1");
    assert_eq!(saved.metadata.duration, "01:35");
    assert!(saved.metadata.noise_cancelled);
    assert_eq!(seen.lock().unwrap().first(), Some(&0));
    assert_eq!(seen.lock().unwrap().last(), Some(&100));

    let lectures = library.list().await?;
    assert_eq!(lectures.len(), 1);
    assert_eq!(lectures[0].title, "Conditionals");
    assert_eq!(lectures[0].notes, "Type 2 and 3");
    assert_eq!(
        library.audio("1").await.map(|a| a.data),
        Some(audio.data.clone())
    );

    library.delete("1").await?;
    assert!(library.list().await?.is_empty());
    assert!(library.delete("1").await.is_err());
    Ok(())
}

// ============================================================================
// HTTP persistence against a local server
// ============================================================================

#[derive(Clone, Default)]
struct Backend {
    uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    reject: bool,
}

async fn receive(
    State(backend): State<Backend>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if backend.reject {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage offline").into_response();
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    backend
        .uploads
        .lock()
        .unwrap()
        .push((content_type, body.to_vec()));

    Json(json!({
        "id": 17,
        "url": "https://lectures.example/17",
        "title": "Reported speech",
        "duration": "01:35",
        "noiseCancelled": false,
    }))
    .into_response()
}

async fn listing() -> impl IntoResponse {
    Json(json!([
        { "id": 17, "title": "Reported speech", "duration": "01:35", "date": "Oct 1, 2026" },
        { "id": "abc", "title": "Idioms" }
    ]))
}

async fn remove(Path(id): Path<String>) -> impl IntoResponse {
    if id == "17" {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn serve(backend: Backend) -> Result<String> {
    let app = Router::new()
        .route("/api/recordings", post(receive).get(listing))
        .route("/api/recordings/:id", delete(remove))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}/api/", addr))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn test_http_upload_sends_multipart_and_reports_progress() -> Result<()> {
    let backend = Backend::default();
    let base_url = serve(backend.clone()).await?;
    let client = HttpPersistence::new(base_url, Duration::from_secs(10))?;
    let boundary = HandoffBoundary::new(Arc::new(client));

    let audio = artifact(600 * 1024);
    let (progress, seen) = recorder();
    let saved = boundary
        .submit(
            &audio,
            &RecordingDraft::new("Reported speech").with_notes("B2 group"),
            progress,
        )
        .await?;

    assert_eq!(saved.id, "17");
    assert_eq!(saved.url, "https://lectures.example/17");
    assert_eq!(saved.metadata.duration, "01:35");

    let uploads = backend.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (content_type, body) = &uploads[0];
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(contains(body, b"name=\"audio\""));
    assert!(contains(body, b"filename=\"recording.pcm\""));
    assert!(contains(body, b"audio/L16;rate=48000;channels=1"));
    assert!(contains(body, b"name=\"title\""));
    assert!(contains(body, b"Reported speech"));
    assert!(contains(body, b"B2 group"));
    assert!(contains(body, b"name=\"noiseCancelled\""));
    assert!(contains(body, b"name=\"audioQuality\""));
    assert!(contains(body, b"name=\"category\""));
    assert!(contains(body, &audio.data[..4096]));
    assert!(body.len() > audio.size());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", *seen);
    assert!(seen.iter().any(|&p| p > 0 && p < 100), "{:?}", *seen);
    Ok(())
}

#[tokio::test]
async fn test_http_server_error_is_upload_failure() -> Result<()> {
    let base_url = serve(Backend {
        reject: true,
        ..Backend::default()
    })
    .await?;
    let boundary = HandoffBoundary::new(Arc::new(HttpPersistence::new(
        base_url,
        Duration::from_secs(10),
    )?));

    let (progress, seen) = recorder();
    let err = boundary
        .submit(&artifact(2048), &RecordingDraft::new("Articles"), progress)
        .await
        .unwrap_err();

    match err {
        RecorderError::UploadFailure(message) => assert!(message.contains("500"), "{}", message),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(seen.lock().unwrap().last(), Some(&0));
    Ok(())
}

#[tokio::test]
async fn test_http_unreachable_backend_is_upload_failure() -> Result<()> {
    // Bind and drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = HttpPersistence::new(format!("http://{}", addr), Duration::from_secs(5))?;
    let boundary = HandoffBoundary::new(Arc::new(client));

    let err = boundary
        .submit(&artifact(128), &RecordingDraft::new("Gerunds"), no_progress())
        .await
        .unwrap_err();
    assert!(matches!(err, RecorderError::UploadFailure(_)));
    Ok(())
}

#[tokio::test]
async fn test_http_list_and_delete() -> Result<()> {
    let base_url = serve(Backend::default()).await?;
    let client = HttpPersistence::new(base_url, Duration::from_secs(10))?;

    let lectures = client.list().await?;
    assert_eq!(lectures.len(), 2);
    assert_eq!(lectures[0].id, "17");
    assert_eq!(lectures[0].date, "Oct 1, 2026");
    assert_eq!(lectures[1].id, "abc");
    assert_eq!(lectures[1].duration, "");

    client.delete("17").await?;
    assert!(client.delete("18").await.is_err());
    Ok(())
}
