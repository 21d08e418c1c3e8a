// Encoding pipeline
//
// One task per recording: frames arrive from the capture device, the
// encoder accumulates them, and every tick the encoded bytes leave as a
// chunk event. The session controls the task through a watch channel and
// drains events from an unbounded channel.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioFrame, Chunk, LevelFeed, PcmEncoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineMode {
    Running,
    Paused,
    /// Flush and exit; `drain` encodes frames still queued from the device
    Stopping { drain: bool },
}

#[derive(Debug)]
pub(crate) enum PipelineEvent {
    Chunk(Chunk),
    /// The capture stream closed while the session still wanted audio
    TrackEnded { reason: String },
}

pub(crate) struct Pipeline {
    mode: watch::Sender<PipelineMode>,
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    task: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub(crate) fn spawn(
        frames: mpsc::Receiver<AudioFrame>,
        encoder: PcmEncoder,
        feed: LevelFeed,
        tick: Duration,
    ) -> Self {
        let (mode_tx, mode_rx) = watch::channel(PipelineMode::Running);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(frames, encoder, feed, tick, mode_rx, event_tx));

        Self {
            mode: mode_tx,
            events: event_rx,
            task: Some(task),
        }
    }

    pub(crate) fn set_mode(&self, mode: PipelineMode) {
        self.mode.send_replace(mode);
    }

    /// Next event already delivered, without waiting
    pub(crate) fn try_next(&mut self) -> Option<PipelineEvent> {
        self.events.try_recv().ok()
    }

    /// Ask the task to flush and exit, then hand back every remaining event
    pub(crate) async fn stop(mut self, drain: bool) -> Vec<PipelineEvent> {
        self.set_mode(PipelineMode::Stopping { drain });

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Encoding task panicked: {}", e);
            }
        }

        let mut remaining = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            remaining.push(event);
        }
        remaining
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut frames: mpsc::Receiver<AudioFrame>,
    mut encoder: PcmEncoder,
    mut feed: LevelFeed,
    tick: Duration,
    mut mode: watch::Receiver<PipelineMode>,
    events: mpsc::UnboundedSender<PipelineEvent>,
) {
    let started = Instant::now();
    let mut ticker = interval_at(started + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence: u64 = 0;
    // Last mode the loop acted on
    let mut applied = PipelineMode::Running;

    info!("Encoding task started ({}ms tick)", tick.as_millis());

    loop {
        let current = *mode.borrow_and_update();
        match (applied, current) {
            (_, PipelineMode::Stopping { .. }) => break,
            (PipelineMode::Running, PipelineMode::Paused) => {
                // Frames queued before the pause are part of the recording
                let mut kept = 0;
                while let Ok(frame) = frames.try_recv() {
                    encoder.encode(&frame);
                    kept += 1;
                }
                debug!("Encoding paused ({} queued frames kept)", kept);
                feed.halt();
            }
            (PipelineMode::Paused, PipelineMode::Running) => {
                debug!("Encoding resumed");
                ticker.reset();
            }
            _ => {}
        }
        applied = current;

        tokio::select! {
            biased;

            changed = mode.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            frame = frames.recv() => match frame {
                Some(frame) => {
                    if applied == PipelineMode::Running {
                        feed.observe(&frame);
                        encoder.encode(&frame);
                    }
                }
                None => {
                    warn!("Capture stream ended unexpectedly");
                    encoder.finish();
                    emit(&mut encoder, &mut sequence, started, &events);
                    feed.halt();
                    let _ = events.send(PipelineEvent::TrackEnded {
                        reason: "capture stream ended unexpectedly".to_string(),
                    });
                    return;
                }
            },

            _ = ticker.tick(), if current == PipelineMode::Running => {
                emit(&mut encoder, &mut sequence, started, &events);
            }
        }
    }

    // Frames the device delivered before the stop request still belong to the recording
    if matches!(*mode.borrow(), PipelineMode::Stopping { drain: true }) {
        while let Ok(frame) = frames.try_recv() {
            encoder.encode(&frame);
        }
    }
    encoder.finish();
    emit(&mut encoder, &mut sequence, started, &events);
    feed.halt();

    info!(
        "Encoding task stopped: {} chunks, {} samples",
        sequence,
        encoder.samples_encoded()
    );
}

fn emit(
    encoder: &mut PcmEncoder,
    sequence: &mut u64,
    started: Instant,
    events: &mpsc::UnboundedSender<PipelineEvent>,
) {
    if let Some(data) = encoder.flush() {
        let chunk = Chunk {
            sequence: *sequence,
            data,
            captured_at_ms: started.elapsed().as_millis() as u64,
        };
        *sequence += 1;
        if events.send(PipelineEvent::Chunk(chunk)).is_err() {
            warn!("Session dropped before chunk could be delivered");
        }
    }
}
