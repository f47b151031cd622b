//! Persisted player preferences.
//!
//! Stored as JSON in `<config dir>/pulse/settings.json`. Missing or
//! unreadable files fall back to defaults; unknown or absent fields take
//! their default value so older files keep loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::engine::{EngineConfig, DEFAULT_BLOCK_FRAMES, DEFAULT_PAUSE_POLL};
use crate::error::{PlayerError, Result};
use crate::playlist::RepeatMode;

const FILE_NAME: &str = "settings.json";
const APP_DIR: &str = "pulse";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerSettings {
    pub bands: usize,
    /// Milliseconds between visualizer ticks.
    pub tick_ms: u64,
    /// Ticks of per-band history averaged before smoothing.
    pub history: usize,
    /// Smoothing factor while rising.
    pub attack: f32,
    /// Smoothing factor while falling.
    pub release: f32,
    /// Largest change of one band in a single tick.
    pub max_delta: f32,
    /// A boost is armed on average once every this many idle ticks.
    pub boost_interval: u32,
    pub boost_duration: u32,
    pub boost_strength: f32,
    pub fade_duration: u32,
    pub fade_stagger: u32,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            bands: 30,
            tick_ms: 50,
            history: 3,
            attack: 0.7,
            release: 0.1,
            max_delta: 2.0,
            boost_interval: 25,
            boost_duration: 8,
            boost_strength: 1.7,
            fade_duration: 15,
            fade_stagger: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Output volume (0 – 100).
    pub volume_percent: u8,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    /// Frames decoded per playback iteration.
    pub block_frames: usize,
    pub pause_poll_ms: u64,
    pub visualizer: VisualizerSettings,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume_percent: 100,
            repeat: RepeatMode::None,
            shuffle: false,
            block_frames: DEFAULT_BLOCK_FRAMES,
            pause_poll_ms: DEFAULT_PAUSE_POLL.as_millis() as u64,
            visualizer: VisualizerSettings::default(),
        }
    }
}

impl PlayerSettings {
    /// Platform config directory for the player, if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join(APP_DIR))
    }

    /// Load settings from `dir`. Returns defaults if the file doesn't exist
    /// or can't be parsed.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(FILE_NAME);
        let Ok(data) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable settings {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| PlayerError::Settings(format!("failed to create dir: {}", e)))?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PlayerError::Settings(format!("serialize failed: {}", e)))?;
        std::fs::write(dir.join(FILE_NAME), json)
            .map_err(|e| PlayerError::Settings(format!("write failed: {}", e)))?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            block_frames: self.block_frames.max(1),
            pause_poll: Duration::from_millis(self.pause_poll_ms.max(1)),
        }
    }
}
