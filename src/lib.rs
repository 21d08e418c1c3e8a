pub mod audio;
pub mod config;
pub mod error;
pub mod handoff;
pub mod http;
pub mod session;

pub use audio::{
    AudioFile, AudioFrame, CaptureConstraints, CaptureDevice, CaptureDeviceFactory, CaptureSource,
    ChannelDevice, Chunk, ChunkAccumulator, FileDevice, FinalizeConfig, FrameInjector,
    LevelSnapshot, SyntheticDevice,
};
pub use config::Config;
pub use error::{CaptureError, RecorderError};
pub use handoff::{
    HandoffBoundary, HttpPersistence, InMemoryLibrary, LecturePersistence, PersistedRecording,
    ProgressCallback, RecordingDraft,
};
pub use http::{create_router, AppState};
pub use session::{
    Artifact, CaptureConfig, CaptureSession, ConfirmationGate, DestructiveAction, SessionConfig,
    SessionState, SessionStats, StaticGate,
};
