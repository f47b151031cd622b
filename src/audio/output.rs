// Audio output using cpal
// The playback thread pushes blocks into a small ring buffer; the device
// callback drains it. `write` blocks while the ring is full, which paces the
// playback loop to real time.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::backend::OutputStream;
use super::ring_buffer::RingBuffer;
use super::session::TrackSpec;
use crate::error::{PlayerError, Result};

/// How many blocks may sit between the loop and the speaker.
const QUEUED_BLOCKS: usize = 4;

/// Sleep between attempts while the ring is full.
const WRITE_RETRY: Duration = Duration::from_millis(2);

pub struct CpalOutput {
    stream: Option<Stream>,
    ring: Arc<RingBuffer>,
    channels: u16,
    sample_rate: u32,
    failed: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Opens the default device at the track's sample rate.
    pub fn open(spec: TrackSpec, block_frames: usize) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::Device("no output device available".into()))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| PlayerError::Device(format!("failed to get default output config: {}", e)))?;

        let channels = pick_channels(&device, spec);
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = Arc::new(RingBuffer::with_min_capacity(
            block_frames.max(1) * channels as usize * QUEUED_BLOCKS,
        ));
        let failed = Arc::new(AtomicBool::new(false));

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, ring.clone(), failed.clone())?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, ring.clone(), failed.clone())?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, ring.clone(), failed.clone())?,
            format => {
                return Err(PlayerError::Device(format!(
                    "unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| PlayerError::Device(format!("failed to start stream: {}", e)))?;

        log::debug!(
            "Opened output stream: {} Hz, {} channels, ring {} samples",
            spec.sample_rate,
            channels,
            ring.capacity()
        );

        Ok(Self {
            stream: Some(stream),
            ring,
            channels,
            sample_rate: spec.sample_rate,
            failed,
        })
    }

    fn check_failed(&self) -> Result<()> {
        if self.failed.load(Ordering::Relaxed) {
            Err(PlayerError::Device("output stream failed".into()))
        } else {
            Ok(())
        }
    }
}

impl OutputStream for CpalOutput {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let mut remaining = samples;
        while !remaining.is_empty() {
            self.check_failed()?;
            let written = self.ring.write(remaining);
            remaining = &remaining[written..];
            if !remaining.is_empty() {
                thread::sleep(WRITE_RETRY);
            }
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause stream: {}", e);
            }
        }
    }

    fn resume(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.play() {
                log::warn!("Failed to resume stream: {}", e);
            }
        }
    }

    fn discard(&mut self) {
        self.ring.request_clear();
    }

    fn drain(&mut self) {
        // Whatever is queued plays out in well under this.
        let queued_secs = self.ring.capacity() as f64
            / (self.sample_rate.max(1) as f64 * self.channels.max(1) as f64);
        let deadline = Instant::now() + Duration::from_secs_f64(queued_secs + 0.5);

        while self.ring.available_read() > 0
            && !self.failed.load(Ordering::Relaxed)
            && Instant::now() < deadline
        {
            thread::sleep(WRITE_RETRY);
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
            log::debug!("Closed output stream");
        }
    }
}

/// Prefer the track's own layout; fall back to stereo when the device can't
/// take it at this rate.
fn pick_channels(device: &cpal::Device, spec: TrackSpec) -> u16 {
    let ranges: Vec<_> = match device.supported_output_configs() {
        Ok(configs) => configs.collect(),
        Err(_) => return spec.channels, // Can't query, hope for the best
    };

    let supports = |channels: u16| {
        ranges.iter().any(|range| {
            range.channels() == channels
                && spec.sample_rate >= range.min_sample_rate().0
                && spec.sample_rate <= range.max_sample_rate().0
        })
    };

    if supports(spec.channels) {
        spec.channels
    } else if supports(2) {
        log::warn!(
            "Device can't play {} channels at {} Hz, using stereo",
            spec.channels,
            spec.sample_rate
        );
        2
    } else {
        spec.channels
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    ring: Arc<RingBuffer>,
    failed: Arc<AtomicBool>,
) -> Result<Stream> {
    // Grown on the first callback only.
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let read = ring.read(&mut scratch[..data.len()]);

                // Underrun is padded with silence
                for (i, sample) in data.iter_mut().enumerate() {
                    let value = if i < read { scratch[i] } else { 0.0 };
                    *sample = T::from_sample(value);
                }
            },
            move |err| {
                log::error!("Stream error: {}", err);
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    failed.store(true, Ordering::Relaxed);
                }
            },
            None,
        )
        .map_err(|e| PlayerError::Device(format!("failed to build output stream: {}", e)))
}

// ─── Device Enumeration ───

#[derive(Clone, Debug)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

pub fn output_devices() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    if let Ok(out) = host.output_devices() {
        for dev in out {
            if let Ok(name) = dev.name() {
                let is_default = default_name.as_deref() == Some(name.as_str());
                devices.push(AudioDeviceInfo { name, is_default });
            }
        }
    }
    devices
}
