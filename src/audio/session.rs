use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Sample rate and channel layout of a decoded stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Immutable description of the loaded file. Replaced on every `load`.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub path: PathBuf,
    pub spec: TrackSpec,
    /// `None` when the container doesn't report a length.
    pub total_frames: Option<u64>,
}

impl Track {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.total_frames
            .map(|frames| frames as f64 / self.spec.sample_rate.max(1) as f64)
    }

    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 / self.spec.sample_rate.max(1) as f64
    }

    /// Seconds to a frame index clamped into `[0, total_frames)`.
    pub fn secs_to_frame(&self, secs: f64) -> u64 {
        let frame = (secs.max(0.0) * self.spec.sample_rate as f64) as u64;
        match self.total_frames {
            Some(total) => frame.min(total.saturating_sub(1)),
            None => frame,
        }
    }
}

// ─── Atomic f32 helpers (lock-free volume) ───

#[inline]
fn f32_to_atomic(v: f32) -> u32 {
    v.to_bits()
}

#[inline]
fn atomic_to_f32(b: u32) -> f32 {
    f32::from_bits(b)
}

/// The only mutable state shared between the controller and the playback thread.
///
/// Commands are plain flag stores; the loop polls them at the top of every
/// iteration and once per idle sleep while paused.
pub(crate) struct SessionControl {
    stop: AtomicBool,
    paused: AtomicBool,
    seek_pending: AtomicBool,
    seek_target: AtomicU64,
    position: AtomicU64,
    volume: AtomicU32,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            seek_pending: AtomicBool::new(false),
            seek_target: AtomicU64::new(0),
            position: AtomicU64::new(0),
            volume: AtomicU32::new(f32_to_atomic(1.0)),
        }
    }

    /// Clears everything bound to the previous track. Volume survives.
    pub fn reset_for_load(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.seek_pending.store(false, Ordering::SeqCst);
        self.position.store(0, Ordering::SeqCst);
    }

    /// A fresh loop starts unpaused and not stopping. Pending seeks are kept.
    pub fn reset_for_start(&self) {
        self.stop.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn request_seek(&self, frame: u64) {
        // Target first, then the flag, so the loop never sees the flag with a stale target.
        self.seek_target.store(frame, Ordering::SeqCst);
        self.seek_pending.store(true, Ordering::SeqCst);
    }

    pub fn take_seek(&self) -> Option<u64> {
        if self.seek_pending.swap(false, Ordering::SeqCst) {
            Some(self.seek_target.load(Ordering::SeqCst))
        } else {
            None
        }
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn set_position(&self, frame: u64) {
        self.position.store(frame, Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        atomic_to_f32(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, gain: f32) {
        self.volume.store(f32_to_atomic(gain), Ordering::Relaxed);
    }
}
