pub mod audio;
pub mod error;
pub mod metadata;
pub mod player;
pub mod playlist;
pub mod settings;
pub mod visualizer;

pub use error::{PlayerError, Result};
