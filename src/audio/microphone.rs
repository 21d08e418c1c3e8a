// Microphone capture via cpal
//
// cpal streams are not Send on every platform, so the stream lives on a
// dedicated thread that owns it until `release` signals shutdown.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{AudioFrame, CaptureConstraints, CaptureDevice};
use crate::error::CaptureError;

/// Wakes the thread that owns the stream
#[derive(Debug)]
enum WorkerSignal {
    Stop,
    /// The stream can no longer deliver audio
    Failed(String),
}

struct StreamWorker {
    signal_tx: std_mpsc::Sender<WorkerSignal>,
    thread: JoinHandle<()>,
}

pub struct MicrophoneDevice {
    device_name: Option<String>,
    worker: Option<StreamWorker>,
}

impl MicrophoneDevice {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            worker: None,
        }
    }
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => {
            let devices = host
                .input_devices()
                .map_err(|e| CaptureError::CaptureInit(e.to_string()))?;
            for device in devices {
                if device.name().map(|n| n == wanted).unwrap_or(false) {
                    return Ok(device);
                }
            }
            Err(CaptureError::DeviceNotFound(wanted.to_string()))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("default input device".to_string())),
    }
}

fn classify(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("not authorized") {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::CaptureInit(message)
    }
}

/// Errors after which the stream will not produce another callback
fn is_fatal(error: &cpal::StreamError) -> bool {
    matches!(error, cpal::StreamError::DeviceNotAvailable)
}

/// Keep `stream` alive until told to stop or the stream fails.
///
/// The stream's data callback owns the frame sender, so dropping the
/// stream closes the frame channel and the consumer sees the track end.
fn hold_until_signal<S>(stream: S, signals: &std_mpsc::Receiver<WorkerSignal>) {
    match signals.recv() {
        Ok(WorkerSignal::Stop) | Err(_) => debug!("Input stream stop requested"),
        Ok(WorkerSignal::Failed(reason)) => warn!("Input stream lost: {}", reason),
    }
    drop(stream);
}

fn build_stream(
    device: &cpal::Device,
    frame_tx: mpsc::Sender<AudioFrame>,
    signal_tx: std_mpsc::Sender<WorkerSignal>,
) -> Result<cpal::Stream, CaptureError> {
    let supported = device
        .default_input_config()
        .map_err(|e| classify(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let started = Instant::now();

    info!(
        "Opening input stream: {}Hz, {} channels, {:?}",
        sample_rate, channels, sample_format
    );

    let on_error = move |e: cpal::StreamError| {
        error!("Input stream error: {}", e);
        if is_fatal(&e) {
            let _ = signal_tx.send(WorkerSignal::Failed(e.to_string()));
        }
    };

    let deliver = move |samples: Vec<i16>| {
        let frame = AudioFrame {
            samples,
            sample_rate,
            channels,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };
        if frame_tx.try_send(frame).is_err() {
            debug!("Dropping input frame: consumer is behind");
        }
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                deliver(
                    data.iter()
                        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect(),
                )
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| deliver(data.to_vec()),
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                deliver(data.iter().map(|&s| (s as i32 - 32768) as i16).collect())
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::CaptureInit(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| classify(e.to_string()))?;

    stream.play().map_err(|e| classify(e.to_string()))?;
    Ok(stream)
}

#[async_trait::async_trait]
impl CaptureDevice for MicrophoneDevice {
    async fn acquire(
        &mut self,
        constraints: &CaptureConstraints,
    ) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        self.release();

        // cpal exposes none of these hints; the device format wins.
        debug!(
            "Requested constraints are advisory on cpal: echo={}, noise={}, agc={}, {} vendor hints",
            constraints.echo_cancellation,
            constraints.noise_suppression,
            constraints.auto_gain_control,
            constraints.vendor_hints.len()
        );

        let (frame_tx, frame_rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (signal_tx, signal_rx) = std_mpsc::channel::<WorkerSignal>();
        let error_tx = signal_tx.clone();
        let device_name = self.device_name.clone();

        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = find_device(device_name.as_deref())
                    .and_then(|device| build_stream(&device, frame_tx, error_tx));
                match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        hold_until_signal(stream, &signal_rx);
                        info!("Input stream closed");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CaptureError::CaptureInit(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.worker = Some(StreamWorker { signal_tx, thread });
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::CaptureInit(
                "capture thread exited before the stream opened".to_string(),
            )),
        }
    }

    fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.signal_tx.send(WorkerSignal::Stop);
            if worker.thread.join().is_err() {
                warn!("Capture thread panicked during release");
            }
            info!("Microphone released");
        }
    }

    fn is_capturing(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.thread.is_finished())
    }

    fn name(&self) -> &str {
        self.device_name.as_deref().unwrap_or("default microphone")
    }
}

impl Drop for MicrophoneDevice {
    fn drop(&mut self) {
        self.release();
    }
}
