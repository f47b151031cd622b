//! Ties the playlist to the playback engine.
//!
//! The player decides what plays next; the engine only knows about one file
//! at a time. End-of-track notifications from the engine come back in
//! through `handle_event`.

use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};

use crate::audio::engine::PlaybackEngine;
use crate::audio::telemetry::{EndReason, Interest, PlayerEvent};
use crate::error::{PlayerError, Result};
use crate::playlist::{m3u, Playlist, RepeatMode};

pub struct Player {
    engine: PlaybackEngine,
    playlist: Playlist,
    lifecycle: Receiver<PlayerEvent>,
    /// Sessions started whose `TrackEnded` hasn't been handled yet. Only the
    /// end of the newest session may trigger an auto-advance.
    pending_ends: usize,
}

impl Player {
    pub fn new(engine: PlaybackEngine, playlist: Playlist) -> Self {
        let lifecycle = engine.subscribe(Interest::LIFECYCLE);
        Self {
            engine,
            playlist,
            lifecycle,
            pending_ends: 0,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// End-of-track notifications to feed back into `handle_event`.
    pub fn lifecycle_events(&self) -> &Receiver<PlayerEvent> {
        &self.lifecycle
    }

    /// True while a started session hasn't reported its end yet.
    pub fn is_busy(&self) -> bool {
        self.pending_ends > 0
    }

    pub fn subscribe(&self, interest: Interest) -> Receiver<PlayerEvent> {
        self.engine.subscribe(interest)
    }

    /// Replaces the playlist with the contents of an m3u file and stops
    /// playback. Returns the number of entries.
    pub fn open_playlist(&mut self, path: &Path) -> Result<usize> {
        let paths = m3u::load(path)?;
        self.stop();
        self.playlist.set_entries(paths);
        log::info!("Opened playlist {} ({} entries)", path.display(), self.playlist.len());
        Ok(self.playlist.len())
    }

    /// Appends audio files; m3u files among them are expanded in place.
    /// Returns how many entries were added.
    pub fn add_paths<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let before = self.playlist.len();
        let mut expanded = Vec::new();
        for path in paths {
            if m3u::is_playlist_file(&path) {
                match m3u::load(&path) {
                    Ok(entries) => expanded.extend(entries),
                    Err(e) => log::warn!("Skipping playlist: {}", e),
                }
            } else {
                expanded.push(path);
            }
        }
        self.playlist.extend(expanded);
        self.playlist.len() - before
    }

    /// Moves the cursor to `index` and plays it from the start.
    pub fn play_index(&mut self, index: usize) -> Result<()> {
        if index >= self.playlist.len() {
            return Err(PlayerError::State("no such playlist entry"));
        }
        self.playlist.go_to(index);
        self.play_current()
    }

    /// Loads and starts whatever the cursor points at.
    pub fn play_current(&mut self) -> Result<()> {
        let path = self
            .playlist
            .current()
            .map(|entry| entry.path.clone())
            .ok_or(PlayerError::State("playlist is empty"))?;

        self.engine.load(&path)?;
        self.start_engine()
    }

    fn start_engine(&mut self) -> Result<()> {
        self.engine.start()?;
        self.pending_ends += 1;
        Ok(())
    }

    /// Pauses a running session or resumes a paused one. With nothing
    /// running, restarts the loaded track from its position, or plays the
    /// current entry. Returns whether playback is now paused.
    pub fn toggle_pause(&mut self) -> Result<bool> {
        if self.engine.is_running() {
            if self.engine.is_paused() {
                self.engine.resume();
                return Ok(false);
            }
            self.engine.pause();
            return Ok(true);
        }

        let resumable = self.engine.track().is_some_and(|track| {
            track
                .total_frames
                .map_or(true, |total| self.engine.position() + 1 < total)
        });
        if resumable {
            self.start_engine()?;
        } else {
            self.play_current()?;
        }
        Ok(false)
    }

    pub fn next(&mut self) -> Result<()> {
        if self.playlist.next().is_none() {
            return Err(PlayerError::State("playlist is empty"));
        }
        self.play_current()
    }

    pub fn previous(&mut self) -> Result<()> {
        if self.playlist.previous().is_none() {
            return Err(PlayerError::State("playlist is empty"));
        }
        self.play_current()
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.engine.wait();
    }

    pub fn seek_seconds(&self, secs: f64) -> Result<()> {
        let frame = self
            .engine
            .track()
            .ok_or(PlayerError::State("seek with no track loaded"))?
            .secs_to_frame(secs);
        self.engine.seek(frame)
    }

    pub fn set_volume(&self, percent: u8) {
        self.engine.set_volume(percent.min(100) as f32);
    }

    pub fn volume_percent(&self) -> u8 {
        (self.engine.volume() * 100.0).round() as u8
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.playlist.set_repeat_mode(mode);
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.playlist.set_shuffle(enabled);
    }

    /// Removes an entry. Removing the playing song stops playback.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let playing = self.playlist.current_index() == Some(index) && self.engine.track().is_some();
        self.playlist
            .remove(index)
            .ok_or(PlayerError::State("no such playlist entry"))?;
        if playing {
            self.stop();
        }
        Ok(())
    }

    pub fn move_entry(&mut self, from: usize, to: usize) {
        self.playlist.move_entry(from, to);
    }

    pub fn save_playlist(&self, path: &Path) -> Result<()> {
        m3u::save(path, self.playlist.paths())?;
        log::info!("Saved playlist {}", path.display());
        Ok(())
    }

    /// Reacts to engine telemetry. A track that finished or failed moves on
    /// to the next entry; a stopped one doesn't. Returns true if a new track
    /// was started.
    pub fn handle_event(&mut self, event: &PlayerEvent) -> Result<bool> {
        let PlayerEvent::TrackEnded(reason) = event else {
            return Ok(false);
        };

        self.pending_ends = self.pending_ends.saturating_sub(1);
        if self.pending_ends > 0 {
            // A newer session already replaced the one that ended.
            return Ok(false);
        }

        match reason {
            EndReason::Stopped => Ok(false),
            EndReason::Finished | EndReason::Failed => {
                if *reason == EndReason::Failed {
                    log::warn!("Track failed, skipping ahead");
                }
                if self.playlist.advance().is_none() {
                    log::info!("End of playlist");
                    return Ok(false);
                }
                self.play_current_or_next()
            }
        }
    }

    /// Plays the current entry, moving past entries that can't be opened.
    /// Each entry is tried at most once. Returns whether a track started.
    pub fn play_current_or_next(&mut self) -> Result<bool> {
        for _ in 0..self.playlist.len() {
            match self.play_current() {
                Ok(()) => return Ok(true),
                Err(e @ PlayerError::Load { .. }) => log::warn!("Skipping entry: {}", e),
                Err(e) => return Err(e),
            }
            if self.playlist.advance().is_none() {
                log::info!("End of playlist");
                return Ok(false);
            }
        }
        Ok(false)
    }
}
