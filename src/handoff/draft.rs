use serde::{Deserialize, Serialize};

use crate::error::RecorderError;
use crate::session::Artifact;

/// Metadata the user enters alongside a recording
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingDraft {
    /// Required; must be non-empty after trimming
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub noise_cancellation: bool,
}

/// Fields sent to persistence with the audio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub title: String,
    #[serde(default)]
    pub notes: String,
    /// `MM:SS` or `HH:MM:SS`
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub noise_cancelled: bool,
    #[serde(default)]
    pub audio_quality: String,
    #[serde(default)]
    pub category: String,
}

impl RecordingDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_noise_cancellation(mut self, enabled: bool) -> Self {
        self.noise_cancellation = enabled;
        self
    }

    /// Trimmed title, or `InvalidDraft` when nothing is left
    pub fn validated_title(&self) -> Result<&str, RecorderError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(RecorderError::InvalidDraft(
                "a title is required to save the lecture".to_string(),
            ));
        }
        Ok(title)
    }

    pub fn to_metadata(&self, artifact: &Artifact) -> Result<UploadMetadata, RecorderError> {
        let title = self.validated_title()?;
        let audio_quality = if artifact.sample_rate >= 44100 {
            "high"
        } else {
            "standard"
        };

        Ok(UploadMetadata {
            title: title.to_string(),
            notes: self.notes.clone(),
            duration: artifact.duration_label(),
            noise_cancelled: self.noise_cancellation,
            audio_quality: audio_quality.to_string(),
            category: "Recording".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn artifact() -> Artifact {
        Artifact {
            data: Bytes::from_static(&[0, 0, 1, 0]),
            mime_type: "audio/L16;rate=48000;channels=1".to_string(),
            sample_rate: 48000,
            channels: 1,
            duration: Duration::from_secs(3725),
            chunk_count: 1,
        }
    }

    #[test]
    fn blank_titles_are_rejected() {
        for title in ["", "   ", "\t\n"] {
            let err = RecordingDraft::new(title).to_metadata(&artifact()).unwrap_err();
            assert!(matches!(err, RecorderError::InvalidDraft(_)), "{:?}", title);
        }
    }

    #[test]
    fn metadata_trims_title_and_labels_duration() {
        let draft = RecordingDraft::new("  Tenses Masterclass ")
            .with_notes("past perfect")
            .with_noise_cancellation(true);

        let metadata = draft.to_metadata(&artifact()).unwrap();
        assert_eq!(metadata.title, "Tenses Masterclass");
        assert_eq!(metadata.notes, "past perfect");
        assert_eq!(metadata.duration, "01:02:05");
        assert!(metadata.noise_cancelled);
        assert_eq!(metadata.audio_quality, "high");
        assert_eq!(metadata.category, "Recording");
    }

    #[test]
    fn metadata_uses_camel_case_on_the_wire() {
        let metadata = RecordingDraft::new("A").to_metadata(&artifact()).unwrap();
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("noiseCancelled").is_some());
        assert!(json.get("audioQuality").is_some());
    }
}
