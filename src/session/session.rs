use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::artifact::Artifact;
use super::config::{CaptureConfig, SessionConfig};
use super::gate::{ConfirmationGate, DestructiveAction};
use super::pipeline::{Pipeline, PipelineEvent, PipelineMode};
use super::state::SessionState;
use super::stats::SessionStats;
use super::timer::{format_duration, SessionTimer};
use crate::audio::{
    level_channel, AudioFrame, CaptureConstraints, CaptureDevice, Chunk, ChunkAccumulator,
    LevelFeed, LevelSender, LevelSnapshot, PcmEncoder,
};
use crate::error::RecorderError;
use crate::handoff::{HandoffBoundary, PersistedRecording, ProgressCallback, RecordingDraft};

/// Identity of the recording attempt currently owned by the session
#[derive(Debug, Clone)]
struct ActiveRecording {
    id: Uuid,
    started_at: DateTime<Utc>,
    /// Snapshot of the capture options at arm time; never changes afterwards
    constraints: CaptureConstraints,
}

/// Owner of the microphone stream, the encoder and the chunk buffer for
/// one recording at a time.
///
/// Every transition goes through a `&mut self` method, so transitions
/// never interleave. Hardware handles are acquired in [`arm`](Self::arm)
/// and released on stop, failure, reset and drop.
pub struct CaptureSession {
    config: SessionConfig,
    /// Options for the next arm; toggles never touch the active recording
    pending: CaptureConfig,
    device: Box<dyn CaptureDevice>,
    state: SessionState,
    recording: Option<ActiveRecording>,
    /// Stream held between arm and begin_encoding
    armed_stream: Option<mpsc::Receiver<AudioFrame>>,
    pipeline: Option<Pipeline>,
    accumulator: ChunkAccumulator,
    timer: SessionTimer,
    levels: LevelSender,
    artifact: Option<Artifact>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig, device: Box<dyn CaptureDevice>) -> Self {
        info!(
            "Capture session created: device={}, {}Hz, {} channels, {}ms tick",
            device.name(),
            config.sample_rate,
            config.channels,
            config.tick.as_millis()
        );

        Self {
            pending: config.capture.clone(),
            levels: level_channel(config.visualization_bars),
            config,
            device,
            state: SessionState::Idle,
            recording: None,
            armed_stream: None,
            pipeline: None,
            accumulator: ChunkAccumulator::new(),
            timer: SessionTimer::new(),
            artifact: None,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.recording.as_ref().map(|r| r.id)
    }

    /// Options the next session will be armed with
    pub fn capture_config(&self) -> &CaptureConfig {
        &self.pending
    }

    /// Constraints the current session was armed with
    pub fn constraints_used(&self) -> Option<&CaptureConstraints> {
        self.recording.as_ref().map(|r| &r.constraints)
    }

    /// Chunks received so far, in arrival order. Call [`sync`](Self::sync) first for a fresh view.
    pub fn chunks(&self) -> &[Chunk] {
        self.accumulator.chunks()
    }

    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Present only while stopped
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Subscribe to the visualization feed
    pub fn levels(&self) -> watch::Receiver<LevelSnapshot> {
        self.levels.subscribe()
    }

    pub fn device_is_capturing(&self) -> bool {
        self.device.is_capturing()
    }

    pub fn stats(&self) -> SessionStats {
        let elapsed = self.timer.elapsed();
        SessionStats {
            session_id: self.session_id(),
            state: self.state.label(),
            failure_reason: self.state.failure_reason().map(str::to_string),
            is_recording: self.state.is_recording(),
            is_paused: self.state.is_paused(),
            started_at: self.recording.as_ref().map(|r| r.started_at),
            elapsed_secs: elapsed.as_secs_f64(),
            elapsed_label: format_duration(elapsed),
            chunks_count: self.accumulator.len(),
            buffered_bytes: self.accumulator.total_bytes(),
            constraints_used: self.constraints_used().cloned(),
            pending_capture: self.pending.clone(),
            artifact: self.artifact.as_ref().map(Artifact::info),
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Toggle noise cancellation for the next session
    pub fn set_noise_cancellation(&mut self, enabled: bool) {
        if self.pending.noise_cancellation != enabled {
            info!(
                "Noise cancellation {} for next session",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.pending.noise_cancellation = enabled;
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn violation(&self, action: &'static str) -> RecorderError {
        warn!("Rejected {} while {}", action, self.state);
        RecorderError::StateViolation {
            action,
            state: self.state.label(),
        }
    }

    /// Idle -> Armed: acquire the microphone stream
    ///
    /// On failure the device is released, the session stays `Idle` and
    /// the error is returned as is.
    pub async fn arm(&mut self) -> Result<(), RecorderError> {
        if self.state != SessionState::Idle {
            return Err(self.violation("arm"));
        }

        let constraints = self
            .pending
            .constraints(self.config.sample_rate, self.config.channels);
        let id = Uuid::new_v4();
        info!(
            "Arming session {} on {} (noise cancellation: {})",
            id,
            self.device.name(),
            self.pending.noise_cancellation
        );

        match self.device.acquire(&constraints).await {
            Ok(stream) => {
                self.armed_stream = Some(stream);
                self.recording = Some(ActiveRecording {
                    id,
                    started_at: Utc::now(),
                    constraints,
                });
                self.state = SessionState::Armed;
                Ok(())
            }
            Err(e) => {
                warn!("Capture unavailable: {}", e);
                self.device.release();
                self.state = SessionState::Idle;
                Err(e.into())
            }
        }
    }

    /// Armed -> Recording: attach the encoder and start ticking
    pub fn begin_encoding(&mut self) -> Result<(), RecorderError> {
        self.sync();
        if self.state != SessionState::Armed {
            return Err(self.violation("begin encoding"));
        }
        let Some(mut stream) = self.armed_stream.take() else {
            return Err(self.violation("begin encoding"));
        };
        let noise_weighted = self
            .recording
            .as_ref()
            .is_some_and(|r| !r.constraints.vendor_hints.is_empty());

        // Audio delivered before the encoder existed is not part of the recording
        while stream.try_recv().is_ok() {}

        let encoder = PcmEncoder::new(self.config.sample_rate, self.config.channels);
        let feed = LevelFeed::new(
            self.levels.clone(),
            self.config.visualization_bars,
            self.config.visualization_interval,
            noise_weighted,
        );

        self.pipeline = Some(Pipeline::spawn(stream, encoder, feed, self.config.tick));
        self.timer.resume();
        self.state = SessionState::Recording;

        if let Some(id) = self.session_id() {
            info!("Recording started: {}", id);
        }
        Ok(())
    }

    /// Arm and begin encoding in one step
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        self.arm().await?;
        self.begin_encoding()
    }

    /// Start over, discarding an unfinished session only if `gate` agrees
    pub async fn start_new(&mut self, gate: &dyn ConfirmationGate) -> Result<(), RecorderError> {
        self.discard(gate).await?;
        self.start().await
    }

    /// Recording -> Paused
    pub fn pause(&mut self) -> Result<(), RecorderError> {
        self.sync();
        if self.state != SessionState::Recording {
            return Err(self.violation("pause"));
        }
        if let Some(pipeline) = &self.pipeline {
            pipeline.set_mode(PipelineMode::Paused);
        }
        self.timer.pause();
        self.state = SessionState::Paused;

        info!("Recording paused at {}", format_duration(self.timer.elapsed()));
        Ok(())
    }

    /// Paused -> Recording, on the same encoder
    pub fn resume(&mut self) -> Result<(), RecorderError> {
        self.sync();
        if self.state != SessionState::Paused {
            return Err(self.violation("resume"));
        }
        if let Some(pipeline) = &self.pipeline {
            pipeline.set_mode(PipelineMode::Running);
        }
        self.timer.resume();
        self.state = SessionState::Recording;

        info!("Recording resumed at {}", format_duration(self.timer.elapsed()));
        Ok(())
    }

    /// Recording|Paused -> Stopping -> Stopped
    ///
    /// A session that never produced a chunk is released back to `Idle`
    /// and reported as [`RecorderError::EmptySession`].
    pub async fn stop(&mut self) -> Result<&Artifact, RecorderError> {
        self.sync();
        if !self.state.can_stop() {
            return Err(self.violation("stop"));
        }

        let drain = self.state == SessionState::Recording;
        self.state = SessionState::Stopping;
        self.timer.pause();
        info!("Stopping recording at {}", format_duration(self.timer.elapsed()));

        if let Some(pipeline) = self.pipeline.take() {
            for event in pipeline.stop(drain).await {
                if let PipelineEvent::Chunk(chunk) = event {
                    self.accumulator.append(chunk);
                }
            }
        }
        self.device.release();

        if self.accumulator.is_empty() {
            warn!("Stop requested before any audio was captured");
            self.release_resources();
            return Err(RecorderError::EmptySession);
        }

        let data = match self.accumulator.finalize(&self.config.finalize).await {
            Ok(data) => data,
            Err(e) => {
                self.release_resources();
                return Err(e);
            }
        };

        let artifact = Artifact {
            data,
            mime_type: format!(
                "audio/L16;rate={};channels={}",
                self.config.sample_rate, self.config.channels
            ),
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            duration: self.timer.elapsed(),
            chunk_count: self.accumulator.len(),
        };
        info!(
            "Recording stopped: {} ({} bytes, {} chunks)",
            artifact.duration_label(),
            artifact.size(),
            artifact.chunk_count
        );

        self.state = SessionState::Stopped;
        Ok(self.artifact.insert(artifact))
    }

    /// Any state -> Idle, releasing everything synchronously
    pub fn reset(&mut self) {
        if self.state.is_unfinished() || self.device.is_capturing() {
            info!("Resetting session from {}", self.state);
        }
        self.release_resources();
    }

    /// Reset an unfinished session if `gate` confirms; unchanged otherwise
    pub async fn discard(&mut self, gate: &dyn ConfirmationGate) -> Result<(), RecorderError> {
        self.sync();
        if !self.state.is_unfinished() {
            return Ok(());
        }

        let action = DestructiveAction::DiscardRecording {
            session_id: self.session_id(),
        };
        info!("Confirmation requested: {}", action.prompt());
        if !gate.confirm(&action).await {
            info!("Discard declined; keeping session in {}", self.state);
            return Err(RecorderError::DiscardDeclined);
        }

        self.reset();
        Ok(())
    }

    /// Upload the finished recording; on success the session is released
    ///
    /// On failure the session stays `Stopped` with its artifact, so the
    /// same call can be retried.
    pub async fn hand_off(
        &mut self,
        boundary: &HandoffBoundary,
        draft: &RecordingDraft,
        progress: ProgressCallback,
    ) -> Result<PersistedRecording, RecorderError> {
        let artifact = match (&self.state, &self.artifact) {
            (SessionState::Stopped, Some(artifact)) => artifact.clone(),
            _ => return Err(self.violation("hand off")),
        };

        let persisted = boundary.submit(&artifact, draft, progress).await?;
        self.reset();
        Ok(persisted)
    }

    /// Release a session whose artifact was handed off by someone else.
    ///
    /// Does nothing when `session_id` no longer matches, e.g. because the
    /// user already started over.
    pub fn complete_handoff(&mut self, session_id: Uuid) -> bool {
        if self.session_id() == Some(session_id) && self.state == SessionState::Stopped {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Drain delivered chunks and notice streams that ended on their own
    pub fn sync(&mut self) {
        let mut ended: Option<String> = None;

        if let Some(pipeline) = self.pipeline.as_mut() {
            while let Some(event) = pipeline.try_next() {
                match event {
                    PipelineEvent::Chunk(chunk) => self.accumulator.append(chunk),
                    PipelineEvent::TrackEnded { reason } => ended = Some(reason),
                }
            }
        }

        if let Some(stream) = self.armed_stream.as_mut() {
            loop {
                match stream.try_recv() {
                    Ok(_) => continue,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        ended = Some("capture stream ended before recording began".to_string());
                        break;
                    }
                }
            }
        }

        if let Some(reason) = ended {
            self.fail(reason);
        }
    }

    fn fail(&mut self, reason: String) {
        error!("Capture session failed: {}", reason);
        self.pipeline = None;
        self.armed_stream = None;
        self.device.release();
        self.timer.pause();
        self.levels.send_modify(|snapshot| snapshot.active = false);
        self.state = SessionState::Failed { reason };
    }

    fn release_resources(&mut self) {
        // Dropping the pipeline aborts the encoding task
        self.pipeline = None;
        self.armed_stream = None;
        self.device.release();
        self.accumulator.clear();
        self.timer.reset();
        self.artifact = None;
        self.recording = None;
        self.levels
            .send_replace(LevelSnapshot::silent(self.config.visualization_bars));
        self.state = SessionState::Idle;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release_resources();
    }
}
