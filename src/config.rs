use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{CaptureSource, FinalizeConfig};
use crate::session::{CaptureConfig, SessionConfig};

/// Prefix of environment overrides, e.g. `LECTURE_RECORDER__SERVICE__HTTP__PORT=9000`
const ENV_PREFIX: &str = "LECTURE_RECORDER";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub finalize: FinalizeConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// `synthetic`, `microphone` or `file`
    pub source: String,
    /// Device name (microphone) or WAV path (file)
    pub input: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub tick_ms: u64,
    pub noise_cancellation: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            input: None,
            sample_rate: 48000,
            channels: 1,
            tick_ms: 1000,
            noise_cancellation: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub bars: usize,
    pub interval_ms: u64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            bars: 20,
            interval_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Lecture backend; recordings stay in memory when unset
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30 * 60,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick: Duration::from_millis(self.capture.tick_ms.max(1)),
            sample_rate: self.capture.sample_rate,
            channels: self.capture.channels,
            capture: CaptureConfig {
                noise_cancellation: self.capture.noise_cancellation,
            },
            finalize: self.finalize.clone(),
            visualization_bars: self.visualization.bars,
            visualization_interval: Duration::from_millis(self.visualization.interval_ms),
        }
    }

    /// Capture source from `capture.source`/`capture.input`, `~` expanded
    pub fn capture_source(&self) -> Result<CaptureSource> {
        let input = self
            .capture
            .input
            .as_deref()
            .map(|raw| PathBuf::from(shellexpand::tilde(raw).as_ref()));
        CaptureSource::parse(&self.capture.source, input)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.persistence.timeout_secs)
    }
}
