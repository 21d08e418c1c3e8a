use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::timer::format_duration;

/// The finalized recording: every chunk of a session, in arrival order
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Encoded audio bytes
    pub data: Bytes,
    /// MIME/codec label of `data`
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Recorded duration, pauses excluded
    pub duration: Duration,
    /// Number of chunks the artifact was assembled from
    pub chunk_count: usize,
}

/// Serializable summary of an artifact (without the bytes)
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub mime_type: String,
    pub size_bytes: usize,
    pub duration_secs: f64,
    pub duration_label: String,
    pub chunk_count: usize,
}

impl Artifact {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// `MM:SS`, or `HH:MM:SS` past one hour
    pub fn duration_label(&self) -> String {
        format_duration(self.duration)
    }

    /// File extension matching `mime_type`
    pub fn file_extension(&self) -> &'static str {
        "pcm"
    }

    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            mime_type: self.mime_type.clone(),
            size_bytes: self.size(),
            duration_secs: self.duration.as_secs_f64(),
            duration_label: self.duration_label(),
            chunk_count: self.chunk_count,
        }
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn write_samples<W>(&self, writer: &mut hound::WavWriter<W>) -> Result<()>
    where
        W: std::io::Write + std::io::Seek,
    {
        for pair in self.data.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .context("Failed to write sample to WAV")?;
        }
        Ok(())
    }

    /// Wrap the PCM data in a WAV container for playback preview
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.size() + 44));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.wav_spec())
                .context("Failed to create WAV writer")?;
            self.write_samples(&mut writer)?;
            writer.finalize().context("Failed to finalize WAV data")?;
        }
        Ok(cursor.into_inner())
    }

    /// Write a WAV preview to disk
    pub fn save_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = hound::WavWriter::create(path, self.wav_spec())
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
        self.write_samples(&mut writer)?;
        writer.finalize().context("Failed to finalize WAV file")?;

        info!("Saved preview {} ({})", path.display(), self.duration_label());
        Ok(())
    }
}
