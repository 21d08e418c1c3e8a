use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::draft::UploadMetadata;
use crate::session::Artifact;

/// Upload progress in percent (0-100)
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Progress callback that discards updates
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Descriptor of a recording the persistence side accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecording {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub url: String,
    #[serde(flatten)]
    pub metadata: UploadMetadata,
}

/// Library entry as returned by `list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub noise_cancelled: bool,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// Where finished lectures are stored
#[async_trait::async_trait]
pub trait LecturePersistence: Send + Sync {
    /// Transfer the artifact with its metadata, reporting progress as it goes
    async fn upload(
        &self,
        metadata: &UploadMetadata,
        artifact: &Artifact,
        progress: ProgressCallback,
    ) -> Result<PersistedRecording>;

    async fn list(&self) -> Result<Vec<LectureSummary>>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Process-local library, used when no backend is configured
#[derive(Default)]
pub struct InMemoryLibrary {
    entries: RwLock<Vec<(LectureSummary, Artifact)>>,
    next_id: AtomicU64,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored audio for `id`
    pub async fn audio(&self, id: &str) -> Option<Artifact> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|(summary, _)| summary.id == id)
            .map(|(_, artifact)| artifact.clone())
    }
}

#[async_trait::async_trait]
impl LecturePersistence for InMemoryLibrary {
    async fn upload(
        &self,
        metadata: &UploadMetadata,
        artifact: &Artifact,
        progress: ProgressCallback,
    ) -> Result<PersistedRecording> {
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let url = format!("memory://lectures/{}", id);

        let summary = LectureSummary {
            id: id.clone(),
            title: metadata.title.clone(),
            duration: metadata.duration.clone(),
            date: chrono::Utc::now().format("%b %-d, %Y").to_string(),
            url: url.clone(),
            notes: metadata.notes.clone(),
            noise_cancelled: metadata.noise_cancelled,
        };

        {
            let mut entries = self.entries.write().await;
            entries.push((summary, artifact.clone()));
        }
        progress(100);

        info!("Stored lecture {} in memory ({} bytes)", id, artifact.size());

        Ok(PersistedRecording {
            id,
            url,
            metadata: metadata.clone(),
        })
    }

    async fn list(&self) -> Result<Vec<LectureSummary>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().map(|(summary, _)| summary.clone()).collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(summary, _)| summary.id != id);
        if entries.len() == before {
            anyhow::bail!("Lecture {} not found", id);
        }
        info!("Deleted lecture {}", id);
        Ok(())
    }
}
