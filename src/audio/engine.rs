use crossbeam_channel::{bounded, Receiver};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::backend::{AudioBackend, BlockDecoder, OutputStream, SystemBackend};
use super::session::{SessionControl, Track};
use super::telemetry::{AudioBlock, EndReason, Interest, PlayerEvent, Telemetry};
use crate::error::{PlayerError, Result};

pub const DEFAULT_BLOCK_FRAMES: usize = 1024;
pub const DEFAULT_PAUSE_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Frames pulled from the decoder and written per iteration.
    pub block_frames: usize,
    /// Idle sleep between flag checks while paused.
    pub pause_poll: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            pause_poll: DEFAULT_PAUSE_POLL,
        }
    }
}

// ─── Playback Engine ───

/// Owns the single playback session. Driven from the controlling thread;
/// the loop itself runs on a dedicated "playback" thread per `start()`.
pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
    control: Arc<SessionControl>,
    telemetry: Telemetry,
    track: Option<Track>,
    /// Parked here between `load` and `start`, and again after a join.
    decoder: Option<Box<dyn BlockDecoder>>,
    worker: Option<JoinHandle<Box<dyn BlockDecoder>>>,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, config: EngineConfig) -> Self {
        Self {
            backend,
            config,
            control: Arc::new(SessionControl::new()),
            telemetry: Telemetry::new(),
            track: None,
            decoder: None,
            worker: None,
        }
    }

    /// Engine on the system decoder and default output device.
    pub fn system(config: EngineConfig) -> Self {
        Self::new(Arc::new(SystemBackend), config)
    }

    pub fn subscribe(&self, interest: Interest) -> Receiver<PlayerEvent> {
        self.telemetry.subscribe(interest)
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn position(&self) -> u64 {
        self.control.position()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// Current gain (0.0 - 1.0).
    pub fn volume(&self) -> f32 {
        self.control.volume()
    }

    /// Stops and joins any running session, then opens `path`.
    /// Does not start playback.
    pub fn load(&mut self, path: &Path) -> Result<&Track> {
        self.stop();
        self.wait();

        self.track = None;
        self.decoder = None;
        self.control.reset_for_load();

        let decoder = match self.backend.open_decoder(path) {
            Ok(d) => d,
            Err(e) => {
                log::error!("Failed to open: {}", e);
                return Err(e);
            }
        };

        let track = Track {
            path: path.to_path_buf(),
            spec: decoder.spec(),
            total_frames: decoder.total_frames(),
        };
        log::info!(
            "Loaded {} ({} Hz, {} ch, {:?} frames)",
            path.display(),
            track.spec.sample_rate,
            track.spec.channels,
            track.total_frames
        );

        self.control.set_position(decoder.position());
        self.decoder = Some(decoder);
        Ok(&*self.track.insert(track))
    }

    /// Opens the output device and spawns the playback loop.
    ///
    /// Device failures are reported here, synchronously; in that case no
    /// session runs and no `TrackEnded` is published.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(PlayerError::State("playback already running"));
        }
        self.wait();

        let track = self
            .track
            .clone()
            .ok_or(PlayerError::State("no track loaded"))?;
        let decoder = self
            .decoder
            .take()
            .ok_or(PlayerError::State("decoder unavailable, reload the track"))?;

        self.control.reset_for_start();

        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let backend = self.backend.clone();
        let control = self.control.clone();
        let telemetry = self.telemetry.clone();
        let config = self.config;

        let handle = thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let mut decoder = decoder;
                // The stream is created on this thread and never leaves it.
                let output = match backend.open_output(track.spec, config.block_frames) {
                    Ok(output) => {
                        let _ = ready_tx.send(Ok(()));
                        output
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return decoder;
                    }
                };
                run_session(decoder.as_mut(), output, &control, &telemetry, config);
                decoder
            })
            .map_err(|e| PlayerError::Device(format!("failed to spawn playback thread: {}", e)))?;

        self.worker = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                log::error!("Failed to open output: {}", e);
                self.wait();
                Err(e)
            }
            Err(_) => {
                self.wait();
                Err(PlayerError::Device("playback thread exited early".into()))
            }
        }
    }

    pub fn pause(&self) {
        self.control.set_paused(true);
    }

    pub fn resume(&self) {
        self.control.set_paused(false);
    }

    /// Records a seek for the loop to apply. Frames past the end are pulled
    /// back to the last frame.
    pub fn seek(&self, frame: u64) -> Result<()> {
        let track = self
            .track
            .as_ref()
            .ok_or(PlayerError::State("seek with no track loaded"))?;
        let frame = match track.total_frames {
            Some(total) => frame.min(total.saturating_sub(1)),
            None => frame,
        };
        self.control.request_seek(frame);

        // Nothing will pick the flag up until the next start, so keep the
        // reported position honest.
        if !self.is_running() {
            self.control.set_position(frame);
        }
        Ok(())
    }

    /// Cooperative: raises the stop flag only. Use `wait` to reclaim the session.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    /// `percent / 100` as gain, applied from the next block on.
    pub fn set_volume(&self, percent: f32) {
        let gain = (percent / 100.0).clamp(0.0, 1.0);
        self.control.set_volume(gain);
    }

    /// Joins the playback thread if there is one and takes the decoder back.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(_) => log::error!("Playback thread panicked"),
            }
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

// ─── Playback Loop ───

/// Owns the output for the duration of a session. Dropping it is the one
/// place the stream is closed and `TrackEnded` published, whichever way the
/// loop exits.
struct Teardown<'a> {
    output: Box<dyn OutputStream>,
    telemetry: &'a Telemetry,
    reason: EndReason,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        if self.reason == EndReason::Finished {
            self.output.drain();
        }
        self.output.close();
        log::debug!("Session ended: {:?}", self.reason);
        self.telemetry
            .publish(PlayerEvent::TrackEnded(self.reason));
    }
}

fn run_session(
    decoder: &mut dyn BlockDecoder,
    output: Box<dyn OutputStream>,
    control: &SessionControl,
    telemetry: &Telemetry,
    config: EngineConfig,
) {
    // Until proven otherwise, so a panic still reports a failure.
    let mut session = Teardown {
        output,
        telemetry,
        reason: EndReason::Failed,
    };
    session.reason = playback_loop(decoder, session.output.as_mut(), control, telemetry, config);
}

fn playback_loop(
    decoder: &mut dyn BlockDecoder,
    output: &mut dyn OutputStream,
    control: &SessionControl,
    telemetry: &Telemetry,
    config: EngineConfig,
) -> EndReason {
    let in_channels = decoder.spec().channels as usize;
    let out_channels = output.channels() as usize;

    let mut decoded = Vec::with_capacity(config.block_frames * in_channels);
    let mut block = Vec::with_capacity(config.block_frames * out_channels);
    let mut output_paused = false;

    loop {
        if control.stop_requested() {
            return EndReason::Stopped;
        }

        // Seeks are serviced while paused so the position display follows.
        if control.is_paused() {
            if !output_paused {
                output.pause();
                output_paused = true;
            }
            if let Some(target) = control.take_seek() {
                apply_seek(decoder, output, control, telemetry, target);
            }
            std::thread::sleep(config.pause_poll);
            continue;
        }

        if output_paused {
            output.resume();
            output_paused = false;
        }

        if let Some(target) = control.take_seek() {
            apply_seek(decoder, output, control, telemetry, target);
        }

        let frames = match decoder.read_block(config.block_frames, &mut decoded) {
            Ok(0) => return EndReason::Finished,
            Ok(frames) => frames,
            Err(e) => {
                log::warn!("Decode error, ending track: {}", e);
                return EndReason::Failed;
            }
        };

        fit_channels(&decoded[..frames * in_channels], in_channels, out_channels, &mut block);

        // One read per block; a change mid-block lands on the next one.
        apply_gain(&mut block, control.volume());

        if let Err(e) = output.write(&block) {
            log::warn!("Output write failed, ending track: {}", e);
            return EndReason::Failed;
        }

        telemetry.publish(PlayerEvent::Block(AudioBlock::new(out_channels as u16, &block)));
        let position = decoder.position();
        control.set_position(position);
        telemetry.publish(PlayerEvent::Position(position));
    }
}

fn apply_seek(
    decoder: &mut dyn BlockDecoder,
    output: &mut dyn OutputStream,
    control: &SessionControl,
    telemetry: &Telemetry,
    target: u64,
) {
    match decoder.seek(target) {
        Ok(frame) => {
            output.discard();
            control.set_position(frame);
            telemetry.publish(PlayerEvent::Position(frame));
        }
        Err(e) => log::warn!("Seek to frame {} failed: {}", target, e),
    }
}

#[inline]
pub(crate) fn apply_gain(samples: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Maps interleaved frames from `from` channels to `to` channels.
/// Mono is broadcast, wider sources are truncated, narrower ones repeat
/// their last channel.
pub(crate) fn fit_channels(input: &[f32], from: usize, to: usize, out: &mut Vec<f32>) {
    out.clear();
    if from == to {
        out.extend_from_slice(input);
        return;
    }
    for frame in input.chunks_exact(from) {
        for ch in 0..to {
            out.push(frame[ch.min(from - 1)]);
        }
    }
}
