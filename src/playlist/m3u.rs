//! Plain-text playlists: one path per line, `#` lines are comments.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PlayerError, Result};

const HEADER: &str = "#EXTM3U";

pub fn is_playlist_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "m3u" | "m3u8"))
        .unwrap_or(false)
}

/// Parses playlist text. Relative entries resolve against `base`.
pub fn parse(text: &str, base: Option<&Path>) -> Vec<PathBuf> {
    text.lines()
        .map(|line| line.trim_start_matches('\u{feff}').trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let path = PathBuf::from(line);
            match base {
                Some(base) if path.is_relative() => base.join(path),
                _ => path,
            }
        })
        .collect()
}

pub fn load(path: &Path) -> Result<Vec<PathBuf>> {
    let text = fs::read_to_string(path).map_err(|source| PlayerError::Playlist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&text, path.parent()))
}

pub fn save<'a, I>(path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Path>,
{
    let io_err = |source| PlayerError::Playlist {
        path: path.to_path_buf(),
        source,
    };

    let mut out = String::from(HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(&entry.to_string_lossy());
        out.push('\n');
    }

    let mut file = fs::File::create(path).map_err(io_err)?;
    file.write_all(out.as_bytes()).map_err(io_err)?;
    Ok(())
}
