use std::path::Path;

use pulse_lib::audio::backend::BlockDecoder;
use pulse_lib::audio::decoder::SymphoniaDecoder;
use pulse_lib::error::PlayerError;

const RATE: u32 = 8_000;
const FRAMES: u32 = RATE * 2;

/// Sample value that encodes its own frame index.
fn ramp(frame: u32) -> i16 {
    (frame % 1_000) as i16 * 10
}

fn write_wav(path: &Path, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for frame in 0..FRAMES {
        for _ in 0..channels {
            writer.write_sample(ramp(frame)).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn as_f32(sample: i16) -> f32 {
    sample as f32 / 32_768.0
}

#[test]
fn reports_spec_and_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 2);

    let decoder = SymphoniaDecoder::open(&path).unwrap();
    assert_eq!(decoder.spec().sample_rate, RATE);
    assert_eq!(decoder.spec().channels, 2);
    assert_eq!(decoder.total_frames(), Some(FRAMES as u64));
    assert_eq!(decoder.position(), 0);
}

#[test]
fn reads_every_frame_in_fixed_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 1);

    let mut decoder = SymphoniaDecoder::open(&path).unwrap();
    let mut block = Vec::new();
    let mut total = 0u64;
    loop {
        let frames = decoder.read_block(1_000, &mut block).unwrap();
        if frames == 0 {
            break;
        }
        assert_eq!(block.len(), frames);
        assert!((block[0] - as_f32(ramp(total as u32))).abs() < 1e-6);
        total += frames as u64;
        assert_eq!(decoder.position(), total);
    }
    assert_eq!(total, FRAMES as u64);

    // End of stream is sticky.
    assert_eq!(decoder.read_block(1_000, &mut block).unwrap(), 0);
}

#[test]
fn seek_lands_on_requested_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 2);

    let mut decoder = SymphoniaDecoder::open(&path).unwrap();
    let mut block = Vec::new();
    decoder.read_block(500, &mut block).unwrap();

    let target = 12_345;
    assert_eq!(decoder.seek(target).unwrap(), target);
    assert_eq!(decoder.position(), target);

    let frames = decoder.read_block(4, &mut block).unwrap();
    assert_eq!(frames, 4);
    assert!((block[0] - as_f32(ramp(target as u32))).abs() < 1e-6);
    assert!((block[2] - as_f32(ramp(target as u32 + 1))).abs() < 1e-6);

    // And backwards.
    assert_eq!(decoder.seek(10).unwrap(), 10);
    decoder.read_block(1, &mut block).unwrap();
    assert!((block[0] - as_f32(ramp(10))).abs() < 1e-6);
}

#[test]
fn missing_or_garbage_files_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("nope.wav");
    assert!(matches!(
        SymphoniaDecoder::open(&missing),
        Err(PlayerError::Load { .. })
    ));

    let garbage = dir.path().join("noise.mp3");
    std::fs::write(&garbage, b"definitely not audio").unwrap();
    assert!(matches!(
        SymphoniaDecoder::open(&garbage),
        Err(PlayerError::Load { .. })
    ));
}
