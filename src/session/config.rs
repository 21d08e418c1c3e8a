use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::{CaptureConstraints, FinalizeConfig};

/// Legacy Chromium constraint flags requested alongside the standard
/// hints when noise cancellation is enabled
const VENDOR_NOISE_HINTS: &[&str] = &[
    "googEchoCancellation",
    "googEchoCancellation2",
    "googNoiseSuppression",
    "googNoiseSuppression2",
    "googAutoGainControl",
    "googAutoGainControl2",
    "googHighpassFilter",
    "googTypingNoiseDetection",
];

/// User-togglable capture options. Read once per session, when it is armed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub noise_cancellation: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            noise_cancellation: true,
        }
    }
}

impl CaptureConfig {
    pub fn constraints(&self, sample_rate: u32, channels: u16) -> CaptureConstraints {
        let vendor_hints = if self.noise_cancellation {
            VENDOR_NOISE_HINTS.iter().map(|h| h.to_string()).collect()
        } else {
            Vec::new()
        };

        CaptureConstraints {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
            channel_count: channels,
            sample_rate,
            vendor_hints,
        }
    }
}

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Interval at which the encoder is asked for a chunk
    /// Default: 1 second
    pub tick: Duration,

    /// Sample rate of the encoded stream
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Initial capture options
    pub capture: CaptureConfig,

    /// Finalize batching for long sessions
    pub finalize: FinalizeConfig,

    /// Number of visualization bars
    pub visualization_bars: usize,

    /// Refresh interval of the visualization feed
    pub visualization_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            sample_rate: 48000,
            channels: 1,
            capture: CaptureConfig::default(),
            finalize: FinalizeConfig::default(),
            visualization_bars: 20,
            visualization_interval: Duration::from_millis(50),
        }
    }
}
