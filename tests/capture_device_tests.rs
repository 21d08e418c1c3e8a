// Integration tests for capture devices
//
// WAV fixtures are written to a temporary directory with hound.

use anyhow::Result;
use lecture_recorder::audio::{
    AudioFile, CaptureConstraints, CaptureDevice, CaptureDeviceFactory, CaptureSource,
    FileDevice, SyntheticDevice,
};
use lecture_recorder::session::{CaptureSession, SessionConfig, SessionState};
use lecture_recorder::CaptureError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

const RATE: u32 = 16000;

/// Mono 16kHz WAV whose sample `i` has the value `i`
fn write_ramp(dir: &Path, name: &str, samples: usize) -> Result<PathBuf> {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for i in 0..samples {
        writer.write_sample(i as i16)?;
    }
    writer.finalize()?;
    Ok(path)
}

fn file_session(path: PathBuf, tick: Duration) -> CaptureSession {
    let config = SessionConfig {
        tick,
        sample_rate: RATE,
        channels: 1,
        ..SessionConfig::default()
    };
    CaptureSession::new(config, Box::new(FileDevice::new(path)))
}

fn constraints() -> CaptureConstraints {
    SessionConfig::default().capture.constraints(RATE, 1)
}

#[test]
fn test_audio_file_open_reports_format() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_ramp(dir.path(), "ramp.wav", 8000)?;

    let audio = AudioFile::open(&path)?;
    assert_eq!(audio.sample_rate, RATE);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples.len(), 8000);
    assert!((audio.duration_seconds - 0.5).abs() < 1e-9);
    assert!(audio.path.ends_with("ramp.wav"));
    Ok(())
}

#[test]
fn test_audio_file_open_rejects_garbage() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("not-audio.wav");
    std::fs::write(&path, b"definitely not RIFF")?;

    assert!(AudioFile::open(&path).is_err());
    Ok(())
}

#[tokio::test]
async fn test_file_device_missing_file_is_device_not_found() {
    let mut device = FileDevice::new("/nonexistent/lecture.wav");
    let err = device.acquire(&constraints()).await.unwrap_err();
    assert!(matches!(err, CaptureError::DeviceNotFound(_)));
    assert!(!device.is_capturing());
}

#[tokio::test]
async fn test_file_device_corrupt_file_is_capture_init() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.wav");
    std::fs::write(&path, b"RIFF....WAVE")?;

    let mut device = FileDevice::new(path);
    let err = device.acquire(&constraints()).await.unwrap_err();
    assert!(matches!(err, CaptureError::CaptureInit(_)));
    Ok(())
}

#[tokio::test]
async fn test_file_device_replays_in_frames() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_ramp(dir.path(), "ramp.wav", 4000)?;

    let mut device = FileDevice::new(path);
    let mut frames = device.acquire(&constraints()).await?;
    assert!(device.is_capturing());

    let first = frames.recv().await.expect("first frame");
    assert_eq!(first.sample_rate, RATE);
    assert_eq!(first.samples.len(), 1600);
    assert_eq!(first.samples[..3], [0, 1, 2]);

    let second = frames.recv().await.expect("second frame");
    assert_eq!(second.samples[0], 1600);
    assert_eq!(second.timestamp_ms, 100);

    // 4000 samples: two full frames and a partial one, then the track ends
    let third = frames.recv().await.expect("third frame");
    assert_eq!(third.samples.len(), 800);
    assert!(frames.recv().await.is_none());

    device.release();
    assert!(!device.is_capturing());
    Ok(())
}

#[tokio::test]
async fn test_file_session_records_contiguous_audio() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_ramp(dir.path(), "lecture.wav", RATE as usize * 2)?;
    let file_bytes: Vec<u8> = (0..RATE as usize * 2)
        .flat_map(|i| (i as i16).to_le_bytes())
        .collect();

    let mut session = file_session(path, Duration::from_millis(200));
    session.start().await?;
    sleep(Duration::from_millis(550)).await;

    let artifact = session.stop().await?.clone();
    assert_eq!(session.state(), &SessionState::Stopped);
    assert!(artifact.size() > 0);
    assert_eq!(artifact.size() % 3200, 0, "whole 100ms frames only");

    let start = i16::from_le_bytes([artifact.data[0], artifact.data[1]]) as usize * 2;
    assert_eq!(
        artifact.data.as_ref(),
        &file_bytes[start..start + artifact.size()]
    );
    Ok(())
}

#[tokio::test]
async fn test_file_session_fails_when_track_ends() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_ramp(dir.path(), "short.wav", 3200)?;

    let mut session = file_session(path, Duration::from_secs(1));
    session.start().await?;
    sleep(Duration::from_millis(600)).await;
    session.sync();

    assert!(matches!(session.state(), SessionState::Failed { .. }));
    assert!(!session.device_is_capturing());

    session.reset();
    assert_eq!(session.state(), &SessionState::Idle);
    Ok(())
}

#[tokio::test]
async fn test_synthetic_device_honors_constraints() -> Result<()> {
    let mut device = SyntheticDevice::new().with_frame_ms(20).with_tone(440.0);
    let mut constraints = constraints();
    constraints.sample_rate = 8000;
    constraints.channel_count = 2;

    let mut frames = device.acquire(&constraints).await?;
    let frame = frames.recv().await.expect("frame");
    assert_eq!(frame.sample_rate, 8000);
    assert_eq!(frame.channels, 2);
    assert_eq!(frame.samples.len(), 160 * 2);

    device.release();
    assert!(!device.is_capturing());
    Ok(())
}

#[tokio::test]
async fn test_synthetic_device_refusal() {
    let mut device =
        SyntheticDevice::new().refuse_with(CaptureError::PermissionDenied("denied".into()));
    let err = device.acquire(&constraints()).await.unwrap_err();
    assert_eq!(err, CaptureError::PermissionDenied("denied".into()));

    // Refusal applies once
    assert!(device.acquire(&constraints()).await.is_ok());
    device.release();
}

#[test]
fn test_capture_source_parsing() -> Result<()> {
    assert_eq!(CaptureSource::parse("synthetic", None)?, CaptureSource::Synthetic);
    assert_eq!(
        CaptureSource::parse("mic", None)?,
        CaptureSource::Microphone(None)
    );
    assert_eq!(
        CaptureSource::parse("file", Some(PathBuf::from("a.wav")))?,
        CaptureSource::File(PathBuf::from("a.wav"))
    );
    assert!(CaptureSource::parse("file", None).is_err());
    assert!(CaptureSource::parse("tape", None).is_err());
    Ok(())
}

#[test]
fn test_factory_creates_devices() -> Result<()> {
    let synthetic = CaptureDeviceFactory::create(CaptureSource::Synthetic)?;
    assert_eq!(synthetic.name(), "synthetic");

    let file = CaptureDeviceFactory::create(CaptureSource::File(PathBuf::from("x.wav")))?;
    assert_eq!(file.name(), "file");
    Ok(())
}

#[cfg(not(feature = "microphone"))]
#[test]
fn test_microphone_requires_feature() {
    assert!(CaptureDeviceFactory::create(CaptureSource::Microphone(None)).is_err());
}
