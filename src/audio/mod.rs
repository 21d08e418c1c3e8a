pub mod backend;
pub mod channel;
pub mod chunk;
pub mod encoder;
pub mod file;
pub mod synthetic;
pub mod visualizer;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{AudioFrame, CaptureConstraints, CaptureDevice, CaptureDeviceFactory, CaptureSource};
pub use channel::{ChannelDevice, FrameInjector};
pub use chunk::{Chunk, ChunkAccumulator, FinalizeConfig};
pub use encoder::PcmEncoder;
pub use file::{AudioFile, FileDevice};
pub use synthetic::SyntheticDevice;
pub use visualizer::{level_channel, LevelFeed, LevelSender, LevelSnapshot};
