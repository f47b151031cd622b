pub mod reader;

pub use reader::{display_name, read_metadata, TrackMetadata};
