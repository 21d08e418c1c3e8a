use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::time::Duration;
use tracing::{error, info};

use super::draft::UploadMetadata;
use super::persistence::{LectureSummary, LecturePersistence, PersistedRecording, ProgressCallback};
use crate::session::Artifact;

/// Size of the slices the audio is streamed in; progress is reported per slice
const UPLOAD_SLICE_BYTES: usize = 256 * 1024;

/// Long lectures can take many minutes to transfer
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Client for the lecture backend's `/recordings` API
pub struct HttpPersistence {
    client: Client,
    base_url: String,
}

impl HttpPersistence {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Lecture backend: {}", base_url);

        Ok(Self { client, base_url })
    }

    fn recordings_url(&self) -> String {
        format!("{}/recordings", self.base_url)
    }
}

fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent as u64 * 100) / total as u64).min(100) as u8
}

#[async_trait::async_trait]
impl LecturePersistence for HttpPersistence {
    async fn upload(
        &self,
        metadata: &UploadMetadata,
        artifact: &Artifact,
        progress: ProgressCallback,
    ) -> Result<PersistedRecording> {
        let total = artifact.size();
        let data = artifact.data.clone();
        let slices: Vec<_> = (0..total)
            .step_by(UPLOAD_SLICE_BYTES)
            .map(|start| data.slice(start..(start + UPLOAD_SLICE_BYTES).min(total)))
            .collect();

        let mut sent = 0usize;
        let body = stream::iter(slices).map(move |slice| {
            sent += slice.len();
            progress(percent(sent, total));
            Ok::<_, std::io::Error>(slice)
        });

        let audio = Part::stream_with_length(Body::wrap_stream(body), total as u64)
            .file_name(format!("recording.{}", artifact.file_extension()))
            .mime_str(&artifact.mime_type)
            .context("Invalid audio MIME type")?;

        let form = Form::new()
            .part("audio", audio)
            .text("title", metadata.title.clone())
            .text("notes", metadata.notes.clone())
            .text("duration", metadata.duration.clone())
            .text("noiseCancelled", metadata.noise_cancelled.to_string())
            .text("audioQuality", metadata.audio_quality.clone())
            .text("category", metadata.category.clone());

        info!(
            "Uploading \"{}\" ({} bytes, {}) to {}",
            metadata.title,
            total,
            metadata.duration,
            self.recordings_url()
        );

        let response = self
            .client
            .post(self.recordings_url())
            .multipart(form)
            .send()
            .await
            .context("Network error during upload")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Upload rejected: {} {}", status, body);
            anyhow::bail!("Server error: {}", status);
        }

        let persisted: PersistedRecording = response
            .json()
            .await
            .context("Invalid response from server")?;

        info!("Upload complete: lecture {} at {}", persisted.id, persisted.url);
        Ok(persisted)
    }

    async fn list(&self) -> Result<Vec<LectureSummary>> {
        let response = self
            .client
            .get(self.recordings_url())
            .send()
            .await
            .context("Failed to fetch recordings")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch recordings: {}", response.status());
        }

        response
            .json()
            .await
            .context("Invalid recordings list from server")
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.recordings_url(), id))
            .send()
            .await
            .context("Failed to delete recording")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to delete recording {}: {}", id, response.status());
        }

        info!("Deleted lecture {} from backend", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::percent;

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(100, 200), 50);
        assert_eq!(percent(250, 200), 100);
        assert_eq!(percent(0, 0), 100);
    }
}
