//! Bar visualizer fed from the engine's block telemetry.
//!
//! Runs on its own ticker so its cadence is independent of the audio loop.
//! Each tick uses only the most recent block; anything older is dropped.

pub mod amplitude;
pub mod fade;

use crossbeam_channel::{bounded, never, select, tick, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::telemetry::{AudioBlock, PlayerEvent};
use crate::settings::VisualizerSettings;

pub use amplitude::{AmplitudeModel, BoostSide};
pub use fade::FadeAnimation;

/// Frames waiting for the renderer. Older frames are dropped when it lags.
const FRAME_QUEUE: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct AmplitudeFrame {
    pub amplitudes: Vec<f32>,
    /// Envelope-shaped heights in `0.0..=1.0`.
    pub bars: Vec<f32>,
    pub alpha: Vec<u8>,
    /// Every bar has faded out; nothing to draw.
    pub faded: bool,
}

/// Tick-driven visualizer state without any threading.
pub struct VisualizerState {
    model: AmplitudeModel,
    fade: FadeAnimation,
    latest: Option<AudioBlock>,
}

impl VisualizerState {
    pub fn new(settings: VisualizerSettings) -> Self {
        Self::from_model(AmplitudeModel::new(settings), settings)
    }

    pub fn with_seed(settings: VisualizerSettings, seed: u64) -> Self {
        Self::from_model(AmplitudeModel::with_seed(settings, seed), settings)
    }

    fn from_model(model: AmplitudeModel, settings: VisualizerSettings) -> Self {
        let fade = FadeAnimation::new(model.bands(), settings.fade_duration, settings.fade_stagger);
        Self {
            model,
            fade,
            latest: None,
        }
    }

    pub fn set_latest(&mut self, block: AudioBlock) {
        self.latest = Some(block);
    }

    pub fn pause(&mut self) {
        self.latest = None;
        self.fade.start();
    }

    pub fn resume(&mut self) {
        self.fade.cancel();
    }

    pub fn on_tick(&mut self) -> AmplitudeFrame {
        self.model.update(self.latest.as_ref());
        self.fade.step();
        AmplitudeFrame {
            amplitudes: self.model.amplitudes().to_vec(),
            bars: self.model.bar_heights(1.0),
            alpha: self.fade.alphas().to_vec(),
            faded: self.fade.is_faded(),
        }
    }
}

enum Command {
    Pause,
    Resume,
    Shutdown,
}

/// Background ticker producing `AmplitudeFrame`s.
pub struct Visualizer {
    commands: Sender<Command>,
    frames: Receiver<AmplitudeFrame>,
    handle: Option<JoinHandle<()>>,
}

impl Visualizer {
    /// `events` should be a telemetry subscription that includes blocks.
    pub fn spawn(settings: VisualizerSettings, events: Receiver<PlayerEvent>) -> Self {
        let (command_tx, command_rx) = unbounded();
        let (frame_tx, frame_rx) = bounded(FRAME_QUEUE);
        let period = Duration::from_millis(settings.tick_ms.max(1));

        let handle = thread::Builder::new()
            .name("visualizer".into())
            .spawn(move || {
                let state = VisualizerState::new(settings);
                run(state, period, command_rx, events, frame_tx);
            })
            .map_err(|e| log::error!("Failed to spawn visualizer thread: {}", e))
            .ok();

        Self {
            commands: command_tx,
            frames: frame_rx,
            handle,
        }
    }

    pub fn frames(&self) -> &Receiver<AmplitudeFrame> {
        &self.frames
    }

    pub fn pause(&self) {
        let _ = self.commands.send(Command::Pause);
    }

    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }
}

impl Drop for Visualizer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    mut state: VisualizerState,
    period: Duration,
    commands: Receiver<Command>,
    mut events: Receiver<PlayerEvent>,
    frames: Sender<AmplitudeFrame>,
) {
    let ticker = tick(period);
    loop {
        let mut events_closed = false;
        select! {
            recv(ticker) -> _ => {
                let _ = frames.try_send(state.on_tick());
            }
            recv(commands) -> cmd => match cmd {
                Ok(Command::Pause) => state.pause(),
                Ok(Command::Resume) => state.resume(),
                Ok(Command::Shutdown) | Err(_) => break,
            },
            recv(events) -> event => match event {
                Ok(PlayerEvent::Block(block)) => state.set_latest(block),
                Ok(_) => {}
                Err(_) => events_closed = true,
            },
        }
        if events_closed {
            log::debug!("Telemetry closed, visualizer keeps ticking on silence");
            events = never();
        }
    }
    log::debug!("Visualizer stopped");
}
