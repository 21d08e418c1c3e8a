use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::CaptureError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the stream was acquired
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration covered by this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let per_channel = self.samples.len() as u64 / self.channels as u64;
        per_channel * 1000 / self.sample_rate as u64
    }
}

/// Capture hints requested from the platform.
///
/// Every field is advisory: a device may ignore any of them and the
/// session must still produce a playable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    /// Requested channel count (1 = mono)
    pub channel_count: u16,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Vendor-specific hint flags, only populated when noise cancellation is on
    pub vendor_hints: Vec<String>,
}

/// Microphone-like capture source.
///
/// Implementations:
/// - `SyntheticDevice`: generated tone (demos, offline runs)
/// - `ChannelDevice`: frames pushed by another component
/// - `FileDevice`: WAV replay
/// - `MicrophoneDevice`: cpal input (feature `microphone`)
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire a live stream honoring `constraints` on a best-effort basis
    ///
    /// Returns a channel receiver that will receive audio frames. The
    /// stream is considered ended when the receiver reports closed.
    async fn acquire(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Stop all tracks synchronously. Safe to call when nothing is held.
    fn release(&mut self);

    /// Check if the device currently holds a stream
    fn is_capturing(&self) -> bool;

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Generated test tone
    Synthetic,
    /// Default (or named) input device via cpal
    Microphone(Option<String>),
    /// WAV file replayed in real time
    File(PathBuf),
}

impl CaptureSource {
    /// Parse a source name as used in configuration and on the command line
    pub fn parse(name: &str, input: Option<PathBuf>) -> Result<Self> {
        match name {
            "synthetic" => Ok(CaptureSource::Synthetic),
            "microphone" | "mic" => Ok(CaptureSource::Microphone(
                input.map(|p| p.display().to_string()),
            )),
            "file" => match input {
                Some(path) => Ok(CaptureSource::File(path)),
                None => anyhow::bail!("File capture source requires an input path"),
            },
            other => anyhow::bail!("Unknown capture source: {}", other),
        }
    }
}

/// Capture device factory
pub struct CaptureDeviceFactory;

impl CaptureDeviceFactory {
    /// Create a capture device for the given source
    pub fn create(source: CaptureSource) -> Result<Box<dyn CaptureDevice>> {
        match source {
            CaptureSource::Synthetic => Ok(Box::new(super::synthetic::SyntheticDevice::new())),

            CaptureSource::File(path) => {
                Ok(Box::new(super::file::FileDevice::new(path).looping(true)))
            }

            CaptureSource::Microphone(name) => {
                #[cfg(feature = "microphone")]
                {
                    Ok(Box::new(super::microphone::MicrophoneDevice::new(name)))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    anyhow::bail!(
                        "Microphone capture ({}) requires building with the `microphone` feature",
                        name.as_deref().unwrap_or("default device")
                    )
                }
            }
        }
    }
}
