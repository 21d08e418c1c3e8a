use std::sync::Arc;
use tracing::{info, warn};

use super::draft::RecordingDraft;
use super::persistence::{LecturePersistence, PersistedRecording, ProgressCallback};
use crate::error::RecorderError;
use crate::session::Artifact;

/// Hands finished recordings to the persistence collaborator
///
/// Validation happens locally: an invalid draft never reaches
/// persistence. Progress goes 0 -> .. -> 100 on success and back to 0 on
/// failure. The caller's artifact and draft are only borrowed, so a
/// failed upload can be retried as is.
#[derive(Clone)]
pub struct HandoffBoundary {
    persistence: Arc<dyn LecturePersistence>,
}

impl HandoffBoundary {
    pub fn new(persistence: Arc<dyn LecturePersistence>) -> Self {
        Self { persistence }
    }

    /// The collaborator, for library browsing (list/delete)
    pub fn persistence(&self) -> &Arc<dyn LecturePersistence> {
        &self.persistence
    }

    pub async fn submit(
        &self,
        artifact: &Artifact,
        draft: &RecordingDraft,
        progress: ProgressCallback,
    ) -> Result<PersistedRecording, RecorderError> {
        let metadata = draft.to_metadata(artifact)?;
        progress(0);

        match self
            .persistence
            .upload(&metadata, artifact, Arc::clone(&progress))
            .await
        {
            Ok(persisted) => {
                progress(100);
                info!("Lecture \"{}\" saved as {}", metadata.title, persisted.id);
                Ok(persisted)
            }
            Err(e) => {
                progress(0);
                warn!("Upload of \"{}\" failed: {:#}", metadata.title, e);
                Err(RecorderError::UploadFailure(format!("{:#}", e)))
            }
        }
    }
}
