pub mod backend;
pub mod decoder;
pub mod engine;
pub mod output;
pub mod ring_buffer;
pub mod session;
pub mod telemetry;

pub use backend::{AudioBackend, BlockDecoder, OutputStream, SystemBackend};
pub use engine::{EngineConfig, PlaybackEngine};
pub use session::{Track, TrackSpec};
pub use telemetry::{AudioBlock, EndReason, Interest, PlayerEvent};
