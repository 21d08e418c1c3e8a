// Synthetic capture device
//
// Generates a speech-like test signal (a tone with a syllable-rate
// envelope) at the requested sample rate. Used for demos and for running
// the service on machines without an input device.

use std::f32::consts::PI;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice};
use crate::error::CaptureError;

const DEFAULT_FRAME_MS: u64 = 100;
const DEFAULT_TONE_HZ: f32 = 220.0;
const SYLLABLE_HZ: f32 = 4.0;

pub struct SyntheticDevice {
    frame_ms: u64,
    tone_hz: f32,
    /// Close the stream after this long, as if the track ended
    end_after: Option<Duration>,
    /// Refuse the next acquire with this error
    refuse_with: Option<CaptureError>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticDevice {
    pub fn new() -> Self {
        Self {
            frame_ms: DEFAULT_FRAME_MS,
            tone_hz: DEFAULT_TONE_HZ,
            end_after: None,
            refuse_with: None,
            task: None,
        }
    }

    pub fn with_frame_ms(mut self, frame_ms: u64) -> Self {
        self.frame_ms = frame_ms.max(1);
        self
    }

    pub fn with_tone(mut self, tone_hz: f32) -> Self {
        self.tone_hz = tone_hz;
        self
    }

    pub fn end_after(mut self, duration: Duration) -> Self {
        self.end_after = Some(duration);
        self
    }

    pub fn refuse_with(mut self, error: CaptureError) -> Self {
        self.refuse_with = Some(error);
        self
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureDevice for SyntheticDevice {
    async fn acquire(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if let Some(err) = self.refuse_with.take() {
            return Err(err);
        }
        self.release();

        let sample_rate = constraints.sample_rate.max(8000);
        let channels = constraints.channel_count.max(1);
        let frame_ms = self.frame_ms;
        let tone_hz = self.tone_hz;
        let frames_per_tick = (sample_rate as u64 * frame_ms / 1000) as usize;
        let max_frames = self.end_after.map(|d| d.as_millis() as u64 / frame_ms);

        info!(
            "Synthetic device started: {}Hz, {} channels, {}ms frames",
            sample_rate, channels, frame_ms
        );

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(frame_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut position: u64 = 0;
            let mut emitted: u64 = 0;

            loop {
                ticker.tick().await;
                if max_frames.is_some_and(|max| emitted >= max) {
                    debug!("Synthetic track ended after {} frames", emitted);
                    break;
                }

                let mut samples = Vec::with_capacity(frames_per_tick * channels as usize);
                for n in 0..frames_per_tick as u64 {
                    let t = (position + n) as f32 / sample_rate as f32;
                    let envelope = 0.5 * (1.0 - (2.0 * PI * SYLLABLE_HZ * t).cos());
                    let value = (2.0 * PI * tone_hz * t).sin() * envelope * 0.4;
                    let sample = (value * i16::MAX as f32) as i16;
                    for _ in 0..channels {
                        samples.push(sample);
                    }
                }
                position += frames_per_tick as u64;

                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms: emitted * frame_ms,
                };
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
            info!("Synthetic device released");
        }
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.release();
    }
}
