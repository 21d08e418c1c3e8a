use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice};
use crate::error::CaptureError;

const FRAME_MS: u64 = 100;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Replays a WAV file in real time as if it were a microphone
///
/// The file's own format wins over the requested constraints; the encoder
/// converts to the session format.
pub struct FileDevice {
    path: PathBuf,
    looping: bool,
    task: Option<JoinHandle<()>>,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            looping: false,
            task: None,
        }
    }

    /// Restart from the beginning instead of ending the track at EOF
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FileDevice {
    async fn acquire(
        &mut self,
        _constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        self.release();

        if !self.path.exists() {
            return Err(CaptureError::DeviceNotFound(self.path.display().to_string()));
        }
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| CaptureError::CaptureInit(e.to_string()))?
            .map_err(|e| CaptureError::CaptureInit(format!("{:#}", e)))?;

        let samples_per_frame =
            (file.sample_rate as u64 * FRAME_MS / 1000) as usize * file.channels as usize;
        if samples_per_frame == 0 || file.samples.is_empty() {
            return Err(CaptureError::CaptureInit(format!(
                "{} contains no playable audio",
                file.path
            )));
        }

        let samples = Arc::new(file.samples);
        let sample_rate = file.sample_rate;
        let channels = file.channels;
        let looping = self.looping;

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(FRAME_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut offset = 0usize;
            let mut emitted: u64 = 0;

            loop {
                ticker.tick().await;
                if offset >= samples.len() {
                    if !looping {
                        info!("File source reached end of input");
                        break;
                    }
                    offset = 0;
                }

                let end = (offset + samples_per_frame).min(samples.len());
                let frame = AudioFrame {
                    samples: samples[offset..end].to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms: emitted * FRAME_MS,
                };
                offset = end;
                emitted += 1;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File device released: {}", self.path.display());
        }
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileDevice {
    fn drop(&mut self) {
        self.release();
    }
}
