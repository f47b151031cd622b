use lofty::prelude::*;
use lofty::probe::Probe;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{PlayerError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub duration_secs: f64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub file_path: PathBuf,
    pub file_name: String,
    pub format: String,
}

impl TrackMetadata {
    /// "Artist - Title", or just the title, when tags provide one.
    pub fn tagged_name(&self) -> Option<String> {
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        match self.artist.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            Some(artist) => Some(format!("{} - {}", artist, title)),
            None => Some(title.to_string()),
        }
    }
}

pub fn read_metadata(path: &Path) -> Result<TrackMetadata> {
    let tagged_file = Probe::open(path)
        .map_err(|e| PlayerError::load(path, format!("failed to open file: {}", e)))?
        .read()
        .map_err(|e| PlayerError::load(path, format!("failed to read tags: {}", e)))?;

    let properties = tagged_file.properties();
    let duration_secs = properties.duration().as_secs_f64();
    let sample_rate = properties.sample_rate();
    let channels = properties.channels();

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let (title, artist, album, album_artist, year, track_number) = if let Some(tag) = tag {
        (
            tag.title().map(|s| s.to_string()),
            tag.artist().map(|s| s.to_string()),
            tag.album().map(|s| s.to_string()),
            tag.get_string(&ItemKey::AlbumArtist).map(|s| s.to_string()),
            tag.year(),
            tag.track(),
        )
    } else {
        (None, None, None, None, None, None)
    };

    Ok(TrackMetadata {
        title,
        artist,
        album,
        album_artist,
        year,
        track_number,
        duration_secs,
        sample_rate,
        channels,
        file_path: path.to_path_buf(),
        file_name: file_name(path),
        format: format_label(path),
    })
}

/// Label for lists and the status line. Falls back to the file name without
/// its extension when the file has no usable tags.
pub fn display_name(path: &Path) -> String {
    match read_metadata(path) {
        Ok(meta) => meta.tagged_name().unwrap_or_else(|| file_stem(path)),
        Err(e) => {
            log::debug!("No tags for {}: {}", path.display(), e);
            file_stem(path)
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn format_label(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..22_050 * 2 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn untagged_file_uses_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Night Drive.wav");
        write_wav(&path);

        let meta = read_metadata(&path).unwrap();
        assert_eq!(meta.sample_rate, Some(22_050));
        assert_eq!(meta.channels, Some(2));
        assert!((meta.duration_secs - 1.0).abs() < 0.05);
        assert_eq!(meta.file_name, "Night Drive.wav");
        assert_eq!(meta.format, "WAV");
        assert_eq!(display_name(&path), "Night Drive");
    }

    #[test]
    fn unreadable_file_still_has_a_name() {
        let path = Path::new("/nowhere/Some Song.flac");
        assert!(matches!(read_metadata(path), Err(PlayerError::Load { .. })));
        assert_eq!(display_name(path), "Some Song");
    }

    #[test]
    fn tagged_name_prefers_artist_and_title() {
        let mut meta = TrackMetadata {
            title: Some("Title".into()),
            artist: Some("Artist".into()),
            album: None,
            album_artist: None,
            year: None,
            track_number: None,
            duration_secs: 0.0,
            sample_rate: None,
            channels: None,
            file_path: PathBuf::from("x.mp3"),
            file_name: "x.mp3".into(),
            format: "MP3".into(),
        };
        assert_eq!(meta.tagged_name().as_deref(), Some("Artist - Title"));
        meta.artist = Some("  ".into());
        assert_eq!(meta.tagged_name().as_deref(), Some("Title"));
        meta.title = None;
        assert_eq!(meta.tagged_name(), None);
    }
}
