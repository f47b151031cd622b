use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use super::backend::BlockDecoder;
use super::session::TrackSpec;
use crate::error::{PlayerError, Result};

/// Pull-style decoder: hands out fixed-size blocks of interleaved f32 frames
/// regardless of how the container packetizes the stream.
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    spec: TrackSpec,
    time_base: Option<TimeBase>,
    total_frames: Option<u64>,
    /// Decoded samples not yet handed out, starting at `pending_at`.
    pending: Vec<f32>,
    pending_at: usize,
    /// Frames still to drop after an accurate seek landed early.
    skip_frames: u64,
    position: u64,
}

impl SymphoniaDecoder {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PlayerError::load(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let fmt_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &MetadataOptions::default())
            .map_err(|e| PlayerError::load(path, format!("unsupported format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlayerError::load(path, "no audio track found"))?;

        let track_id = track.id;
        let params = &track.codec_params;

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| PlayerError::load(path, format!("no decoder: {}", e)))?;

        let channels = params.channels.map(|c| c.count()).unwrap_or(2);
        if channels == 0 {
            return Err(PlayerError::load(path, "stream has no channels"));
        }

        let spec = TrackSpec {
            sample_rate: params.sample_rate.unwrap_or(44100),
            channels: channels as u16,
        };

        let time_base = params.time_base;
        let total_frames = params.n_frames;

        Ok(Self {
            format,
            decoder,
            track_id,
            spec,
            time_base,
            total_frames,
            pending: Vec::new(),
            pending_at: 0,
            skip_frames: 0,
            position: 0,
        })
    }

    /// Timestamps already count frames for most PCM and lossless streams.
    fn ts_is_frame(&self) -> bool {
        match self.time_base {
            Some(tb) => tb.numer == 1 && tb.denom == self.spec.sample_rate,
            None => true,
        }
    }

    fn frame_to_ts(&self, frame: u64) -> u64 {
        match self.time_base {
            Some(tb) if !self.ts_is_frame() => {
                tb.calc_timestamp(Time::from(frame as f64 / self.spec.sample_rate as f64))
            }
            _ => frame,
        }
    }

    fn ts_to_frame(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) if !self.ts_is_frame() => {
                let t = tb.calc_time(ts);
                ((t.seconds as f64 + t.frac) * self.spec.sample_rate as f64).round() as u64
            }
            _ => ts,
        }
    }

    /// Decodes the next packet of our track into `pending`.
    /// Returns `false` at end of stream.
    fn refill(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(PlayerError::Decode(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(PlayerError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            if num_frames == 0 {
                continue;
            }
            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            let channels = self.spec.channels as usize;
            let mut start = 0;
            if self.skip_frames > 0 {
                let skip = (self.skip_frames as usize).min(num_frames);
                self.skip_frames -= skip as u64;
                start = skip * channels;
            }

            self.pending.clear();
            self.pending.extend_from_slice(&sample_buf.samples()[start..]);
            self.pending_at = 0;
            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
    }
}

impl BlockDecoder for SymphoniaDecoder {
    fn spec(&self) -> TrackSpec {
        self.spec
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, frame: u64) -> Result<u64> {
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: self.frame_to_ts(frame),
                    track_id: self.track_id,
                },
            )
            .map_err(|e| PlayerError::Decode(format!("seek failed: {}", e)))?;

        // Reset decoder state after seek
        self.decoder.reset();
        self.pending.clear();
        self.pending_at = 0;

        let required = self.ts_to_frame(seeked.required_ts);
        let actual = self.ts_to_frame(seeked.actual_ts);
        self.skip_frames = required.saturating_sub(actual);
        self.position = required;
        Ok(required)
    }

    fn read_block(&mut self, max_frames: usize, out: &mut Vec<f32>) -> Result<usize> {
        out.clear();
        let channels = self.spec.channels as usize;
        let wanted = max_frames * channels;

        while out.len() < wanted {
            if self.pending_at >= self.pending.len() && !self.refill()? {
                break;
            }
            let take = (wanted - out.len()).min(self.pending.len() - self.pending_at);
            out.extend_from_slice(&self.pending[self.pending_at..self.pending_at + take]);
            self.pending_at += take;
        }

        let frames = out.len() / channels;
        self.position += frames as u64;
        Ok(frames)
    }
}
