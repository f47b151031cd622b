#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use pulse_lib::audio::backend::{AudioBackend, BlockDecoder, OutputStream};
use pulse_lib::audio::engine::{EngineConfig, PlaybackEngine};
use pulse_lib::audio::session::TrackSpec;
use pulse_lib::audio::telemetry::{EndReason, PlayerEvent};
use pulse_lib::error::{PlayerError, Result};

pub const BLOCK: usize = 256;

pub fn config() -> EngineConfig {
    EngineConfig {
        block_frames: BLOCK,
        pause_poll: Duration::from_millis(2),
    }
}

/// What a scripted decoder produces.
#[derive(Clone, Copy, Debug)]
pub struct Script {
    pub spec: TrackSpec,
    pub total_frames: u64,
    /// Every sample has this value.
    pub level: f32,
    /// `read_block` errors once the position reaches this frame.
    pub fail_at: Option<u64>,
}

impl Script {
    pub fn new(total_frames: u64) -> Self {
        Self {
            spec: TrackSpec {
                sample_rate: 44_100,
                channels: 2,
            },
            total_frames,
            level: 0.5,
            fail_at: None,
        }
    }
}

pub struct ScriptedDecoder {
    script: Script,
    position: u64,
}

impl BlockDecoder for ScriptedDecoder {
    fn spec(&self) -> TrackSpec {
        self.script.spec
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.script.total_frames)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> Result<u64> {
        self.position = frame.min(self.script.total_frames);
        Ok(self.position)
    }

    fn read_block(&mut self, max_frames: usize, out: &mut Vec<f32>) -> Result<usize> {
        out.clear();
        if let Some(fail_at) = self.script.fail_at {
            if self.position >= fail_at {
                return Err(PlayerError::Decode("corrupt frame".into()));
            }
        }
        let frames = (self.script.total_frames - self.position).min(max_frames as u64) as usize;
        out.resize(frames * self.script.spec.channels as usize, self.script.level);
        self.position += frames as u64;
        Ok(frames)
    }
}

/// Everything the outputs were asked to do, across sessions.
#[derive(Default, Debug)]
pub struct OutputLog {
    pub opened: usize,
    pub blocks: Vec<Vec<f32>>,
    pub pauses: usize,
    pub resumes: usize,
    pub discards: usize,
    pub drains: usize,
    pub closes: usize,
}

pub struct RecordingOutput {
    log: Arc<Mutex<OutputLog>>,
    channels: u16,
    write_delay: Duration,
}

impl OutputStream for RecordingOutput {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        // Stands in for the device pacing playback.
        if !self.write_delay.is_zero() {
            thread::sleep(self.write_delay);
        }
        self.log.lock().blocks.push(samples.to_vec());
        Ok(())
    }

    fn pause(&mut self) {
        self.log.lock().pauses += 1;
    }

    fn resume(&mut self) {
        self.log.lock().resumes += 1;
    }

    fn discard(&mut self) {
        self.log.lock().discards += 1;
    }

    fn drain(&mut self) {
        self.log.lock().drains += 1;
    }

    fn close(&mut self) {
        self.log.lock().closes += 1;
    }
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub scripts: Arc<Mutex<HashMap<PathBuf, Script>>>,
    pub log: Arc<Mutex<OutputLog>>,
    /// Paths in the order decoders were opened.
    pub opened: Arc<Mutex<Vec<PathBuf>>>,
    pub fail_output: bool,
    /// Overrides the output channel count; defaults to the track's.
    pub output_channels: Option<u16>,
    pub write_delay: Duration,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(self, path: &str, script: Script) -> Self {
        self.scripts.lock().insert(PathBuf::from(path), script);
        self
    }

    pub fn paced(mut self, write_delay: Duration) -> Self {
        self.write_delay = write_delay;
        self
    }

    pub fn engine(&self) -> PlaybackEngine {
        PlaybackEngine::new(Arc::new(self.clone()), config())
    }
}

impl AudioBackend for FakeBackend {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn BlockDecoder>> {
        let script = self
            .scripts
            .lock()
            .get(path)
            .copied()
            .ok_or_else(|| PlayerError::Load {
                path: path.to_path_buf(),
                reason: "no such file".into(),
            })?;
        self.opened.lock().push(path.to_path_buf());
        Ok(Box::new(ScriptedDecoder {
            script,
            position: 0,
        }))
    }

    fn open_output(&self, spec: TrackSpec, _block_frames: usize) -> Result<Box<dyn OutputStream>> {
        if self.fail_output {
            return Err(PlayerError::Device("no output device available".into()));
        }
        self.log.lock().opened += 1;
        Ok(Box::new(RecordingOutput {
            log: self.log.clone(),
            channels: self.output_channels.unwrap_or(spec.channels),
            write_delay: self.write_delay,
        }))
    }
}

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Collects events until a `TrackEnded` arrives.
pub fn until_end(events: &Receiver<PlayerEvent>) -> (Vec<PlayerEvent>, EndReason) {
    let deadline = Instant::now() + TIMEOUT;
    let mut seen = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(left) {
            Ok(PlayerEvent::TrackEnded(reason)) => return (seen, reason),
            Ok(event) => seen.push(event),
            Err(_) => panic!("no TrackEnded within {:?}", TIMEOUT),
        }
    }
}

/// Waits for the first position event matching `pred`.
pub fn wait_for_position(events: &Receiver<PlayerEvent>, pred: impl Fn(u64) -> bool) -> u64 {
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(left) {
            Ok(PlayerEvent::Position(frame)) if pred(frame) => return frame,
            Ok(_) => {}
            Err(_) => panic!("no matching position within {:?}", TIMEOUT),
        }
    }
}

pub fn positions(events: &[PlayerEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::Position(p) => Some(*p),
            _ => None,
        })
        .collect()
}
