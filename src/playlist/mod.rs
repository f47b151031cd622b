// Playlist: ordered songs, cursor policies and m3u persistence

pub mod m3u;
pub mod sequencer;

pub use sequencer::{Playlist, PlaylistEntry, RepeatMode, TrackId};
