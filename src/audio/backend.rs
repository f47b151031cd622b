/// Seams between the engine and the outside world: a block decoder for the
/// file and a blocking output stream for the device.

use std::path::Path;

use super::decoder::SymphoniaDecoder;
use super::output::CpalOutput;
use super::session::TrackSpec;
use crate::error::Result;

/// Decoder contract. Lives on the playback thread once started.
pub trait BlockDecoder: Send {
    fn spec(&self) -> TrackSpec;

    fn total_frames(&self) -> Option<u64>;

    /// Frame offset of the next frame `read_block` will return.
    fn position(&self) -> u64;

    /// Moves to `frame` and drops anything decoded but not yet returned.
    /// Returns the frame the decoder now sits on.
    fn seek(&mut self, frame: u64) -> Result<u64>;

    /// Replaces `out` with up to `max_frames` interleaved frames.
    /// Returns the frame count; `0` means end of stream.
    fn read_block(&mut self, max_frames: usize, out: &mut Vec<f32>) -> Result<usize>;
}

/// Output-device contract. Created and closed on the playback thread only.
pub trait OutputStream {
    /// Channel count the stream was actually opened with.
    fn channels(&self) -> u16;

    /// Blocks until the device has accepted every sample.
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    /// Throws away queued audio that hasn't reached the speaker yet.
    fn discard(&mut self) {}

    /// Waits for queued audio to play out.
    fn drain(&mut self) {}

    fn close(&mut self);
}

/// Opens decoders and output streams. Shared with the playback thread.
pub trait AudioBackend: Send + Sync {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn BlockDecoder>>;

    fn open_output(&self, spec: TrackSpec, block_frames: usize) -> Result<Box<dyn OutputStream>>;
}

/// symphonia for files, the default cpal device for output.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBackend;

impl AudioBackend for SystemBackend {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn BlockDecoder>> {
        Ok(Box::new(SymphoniaDecoder::open(path)?))
    }

    fn open_output(&self, spec: TrackSpec, block_frames: usize) -> Result<Box<dyn OutputStream>> {
        Ok(Box::new(CpalOutput::open(spec, block_frames)?))
    }
}
