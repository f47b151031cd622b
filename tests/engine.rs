mod common;

use std::path::Path;
use std::thread;
use std::time::Duration;

use common::*;
use pulse_lib::audio::session::TrackSpec;
use pulse_lib::audio::telemetry::{EndReason, Interest, PlayerEvent};
use pulse_lib::error::PlayerError;

#[test]
fn natural_end_publishes_one_finished_and_closes_output() {
    // Ten seconds of 44.1 kHz mono.
    let script = Script {
        spec: TrackSpec {
            sample_rate: 44_100,
            channels: 1,
        },
        ..Script::new(441_000)
    };
    let backend = FakeBackend::new().with_track("a.wav", script);
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::ALL);

    engine.load(Path::new("a.wav")).unwrap();
    engine.start().unwrap();

    let (seen, reason) = until_end(&events);
    assert_eq!(reason, EndReason::Finished);

    let positions = positions(&seen);
    assert_eq!(positions.last(), Some(&441_000));
    assert!(positions.windows(2).all(|w| w[0] <= w[1]));

    engine.wait();
    assert!(!engine.is_running());
    assert_eq!(engine.position(), 441_000);

    let log = backend.log.lock();
    assert_eq!(log.opened, 1);
    assert_eq!(log.closes, 1);
    assert_eq!(log.drains, 1);
    let frames: usize = log.blocks.iter().map(|b| b.len()).sum();
    assert_eq!(frames, 441_000);
    drop(log);

    // Exactly one end notification per session.
    assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn every_written_block_is_published() {
    let backend = FakeBackend::new().with_track("a.wav", Script::new(BLOCK as u64 * 4));
    let mut engine = backend.engine();
    let blocks = engine.subscribe(Interest::BLOCKS);

    engine.load(Path::new("a.wav")).unwrap();
    engine.start().unwrap();
    engine.wait();

    let received: Vec<_> = blocks
        .try_iter()
        .filter_map(|e| match e {
            PlayerEvent::Block(block) => Some(block),
            _ => None,
        })
        .collect();
    assert_eq!(received.len(), 4);
    assert!(received.iter().all(|b| b.channels == 2 && b.frames() == BLOCK));
}

#[test]
fn stop_reports_stopped_without_drain() {
    let backend = FakeBackend::new()
        .with_track("long.wav", Script::new(10_000_000))
        .paced(Duration::from_millis(1));
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::LIFECYCLE);

    engine.load(Path::new("long.wav")).unwrap();
    engine.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    engine.stop();
    engine.wait();

    let (_, reason) = until_end(&events);
    assert_eq!(reason, EndReason::Stopped);
    let log = backend.log.lock();
    assert_eq!(log.closes, 1);
    assert_eq!(log.drains, 0);
}

#[test]
fn decode_error_ends_session_as_failed() {
    let script = Script {
        fail_at: Some(BLOCK as u64 * 3),
        ..Script::new(100_000)
    };
    let backend = FakeBackend::new().with_track("bad.flac", script);
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::ALL);

    engine.load(Path::new("bad.flac")).unwrap();
    engine.start().unwrap();

    let (seen, reason) = until_end(&events);
    assert_eq!(reason, EndReason::Failed);
    assert_eq!(positions(&seen).last(), Some(&(BLOCK as u64 * 3)));

    engine.wait();
    assert_eq!(backend.log.lock().closes, 1);
    assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn device_failure_is_reported_by_start() {
    let backend = FakeBackend {
        fail_output: true,
        ..FakeBackend::new()
    }
    .with_track("a.wav", Script::new(1_000));
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::LIFECYCLE);

    engine.load(Path::new("a.wav")).unwrap();
    let err = engine.start().unwrap_err();
    assert!(matches!(err, PlayerError::Device(_)));
    assert!(!engine.is_running());
    assert!(events.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn commands_without_a_track_are_rejected() {
    let backend = FakeBackend::new();
    let mut engine = backend.engine();

    assert!(matches!(engine.start(), Err(PlayerError::State(_))));
    assert!(matches!(engine.seek(10), Err(PlayerError::State(_))));
    assert!(matches!(
        engine.load(Path::new("missing.wav")),
        Err(PlayerError::Load { .. })
    ));
    assert!(engine.track().is_none());
}

#[test]
fn starting_twice_is_rejected() {
    let backend = FakeBackend::new()
        .with_track("long.wav", Script::new(10_000_000))
        .paced(Duration::from_millis(1));
    let mut engine = backend.engine();

    engine.load(Path::new("long.wav")).unwrap();
    engine.start().unwrap();
    assert!(matches!(engine.start(), Err(PlayerError::State(_))));
    engine.stop();
    engine.wait();
}

#[test]
fn volume_scales_output() {
    let backend = FakeBackend::new().with_track("a.wav", Script::new(BLOCK as u64 * 2));
    let mut engine = backend.engine();
    engine.set_volume(50.0);
    assert_eq!(engine.volume(), 0.5);

    engine.load(Path::new("a.wav")).unwrap();
    engine.start().unwrap();
    engine.wait();

    let log = backend.log.lock();
    assert!(!log.blocks.is_empty());
    assert!(log.blocks.iter().flatten().all(|&s| s == 0.25));
}

#[test]
fn volume_is_clamped() {
    let backend = FakeBackend::new();
    let engine = backend.engine();
    engine.set_volume(250.0);
    assert_eq!(engine.volume(), 1.0);
    engine.set_volume(-5.0);
    assert_eq!(engine.volume(), 0.0);
}

#[test]
fn mono_track_is_widened_for_stereo_output() {
    let script = Script {
        spec: TrackSpec {
            sample_rate: 22_050,
            channels: 1,
        },
        ..Script::new(BLOCK as u64)
    };
    let backend = FakeBackend {
        output_channels: Some(2),
        ..FakeBackend::new()
    }
    .with_track("mono.wav", script);
    let mut engine = backend.engine();

    engine.load(Path::new("mono.wav")).unwrap();
    engine.start().unwrap();
    engine.wait();

    let log = backend.log.lock();
    assert_eq!(log.blocks.len(), 1);
    assert_eq!(log.blocks[0].len(), BLOCK * 2);
}

#[test]
fn seek_while_paused_moves_position_without_playing() {
    let backend = FakeBackend::new()
        .with_track("long.wav", Script::new(10_000_000))
        .paced(Duration::from_millis(1));
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::POSITIONS);

    engine.load(Path::new("long.wav")).unwrap();
    engine.start().unwrap();
    wait_for_position(&events, |_| true);

    engine.pause();
    assert!(engine.is_paused());
    thread::sleep(Duration::from_millis(50));
    let written = backend.log.lock().blocks.len();
    assert!(backend.log.lock().pauses >= 1);

    engine.seek(5_000_000).unwrap();
    wait_for_position(&events, |p| p == 5_000_000);
    assert_eq!(engine.position(), 5_000_000);

    thread::sleep(Duration::from_millis(30));
    assert_eq!(backend.log.lock().blocks.len(), written);
    assert_eq!(backend.log.lock().discards, 1);

    engine.resume();
    let next = wait_for_position(&events, |p| p > 5_000_000);
    assert_eq!(next, 5_000_000 + BLOCK as u64);
    assert!(backend.log.lock().resumes >= 1);

    engine.stop();
    engine.wait();
}

#[test]
fn seek_before_start_sets_starting_point() {
    let backend = FakeBackend::new().with_track("a.wav", Script::new(10_000));
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::POSITIONS);

    engine.load(Path::new("a.wav")).unwrap();
    engine.seek(4_000).unwrap();
    assert_eq!(engine.position(), 4_000);

    engine.start().unwrap();
    let first = wait_for_position(&events, |_| true);
    assert_eq!(first, 4_000);
    let second = wait_for_position(&events, |_| true);
    assert_eq!(second, 4_000 + BLOCK as u64);
    engine.wait();
}

#[test]
fn seek_past_end_is_clamped_to_last_frame() {
    let backend = FakeBackend::new().with_track("a.wav", Script::new(10_000));
    let mut engine = backend.engine();

    engine.load(Path::new("a.wav")).unwrap();
    engine.seek(u64::MAX).unwrap();
    assert_eq!(engine.position(), 9_999);
}

#[test]
fn load_replaces_running_session() {
    let backend = FakeBackend::new()
        .with_track("a.wav", Script::new(10_000_000))
        .with_track("b.wav", Script::new(1_000))
        .paced(Duration::from_millis(1));
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::LIFECYCLE);

    engine.load(Path::new("a.wav")).unwrap();
    engine.start().unwrap();
    thread::sleep(Duration::from_millis(10));

    let track = engine.load(Path::new("b.wav")).unwrap();
    assert_eq!(track.path(), Path::new("b.wav"));
    assert_eq!(track.total_frames, Some(1_000));
    assert!(!engine.is_running());
    assert_eq!(engine.position(), 0);

    let (_, reason) = until_end(&events);
    assert_eq!(reason, EndReason::Stopped);
    assert_eq!(backend.log.lock().closes, 1);
}

#[test]
fn stopped_session_can_be_restarted_where_it_left_off() {
    let backend = FakeBackend::new()
        .with_track("a.wav", Script::new(10_000_000))
        .paced(Duration::from_millis(1));
    let mut engine = backend.engine();
    let events = engine.subscribe(Interest::ALL);

    engine.load(Path::new("a.wav")).unwrap();
    engine.start().unwrap();
    thread::sleep(Duration::from_millis(20));
    engine.stop();
    engine.wait();
    until_end(&events);
    let stopped_at = engine.position();
    assert!(stopped_at > 0);

    engine.start().unwrap();
    let resumed = wait_for_position(&events, |_| true);
    assert_eq!(resumed, stopped_at + BLOCK as u64);
    engine.stop();
    engine.wait();
    assert_eq!(backend.log.lock().opened, 2);
}
