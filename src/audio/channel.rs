use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice};
use crate::error::CaptureError;

#[derive(Default)]
struct Shared {
    sender: Option<mpsc::Sender<AudioFrame>>,
    refuse_with: Option<CaptureError>,
    last_constraints: Option<CaptureConstraints>,
}

/// Capture device fed by frames pushed through a [`FrameInjector`]
///
/// Bridges audio produced elsewhere (another process, a network stream)
/// into a capture session.
pub struct ChannelDevice {
    shared: Arc<Mutex<Shared>>,
    capacity: usize,
}

/// Producer half of a [`ChannelDevice`]
#[derive(Clone)]
pub struct FrameInjector {
    shared: Arc<Mutex<Shared>>,
}

impl ChannelDevice {
    pub fn new() -> (Self, FrameInjector) {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> (Self, FrameInjector) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
                capacity: capacity.max(1),
            },
            FrameInjector { shared },
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ChannelDevice {
    async fn acquire(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let mut shared = self.lock();
        if let Some(err) = shared.refuse_with.take() {
            warn!("Channel device refused acquire: {}", err);
            return Err(err);
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        shared.sender = Some(tx);
        shared.last_constraints = Some(constraints.clone());
        info!("Channel device acquired");
        Ok(rx)
    }

    fn release(&mut self) {
        if self.lock().sender.take().is_some() {
            info!("Channel device released");
        }
    }

    fn is_capturing(&self) -> bool {
        self.lock().sender.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn name(&self) -> &str {
        "channel"
    }
}

impl FrameInjector {
    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver a frame to the active stream. Returns false when no stream is held.
    pub async fn push(&self, frame: AudioFrame) -> bool {
        let sender = self.lock().sender.clone();
        match sender {
            Some(tx) => tx.send(frame).await.is_ok(),
            None => false,
        }
    }

    /// End the active stream as if the track stopped unexpectedly
    pub fn end_track(&self) {
        self.lock().sender = None;
    }

    /// Make the next acquire fail with `error`
    pub fn refuse_next(&self, error: CaptureError) {
        self.lock().refuse_with = Some(error);
    }

    /// Whether the device currently holds an open stream
    pub fn is_open(&self) -> bool {
        self.lock().sender.is_some()
    }

    /// Constraints passed to the most recent acquire
    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.lock().last_constraints.clone()
    }
}
