use std::path::PathBuf;

/// Everything the player surfaces to its caller.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// File missing, corrupt or in a format the decoder can't handle.
    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Output device unavailable or the stream could not be built.
    #[error("audio device error: {0}")]
    Device(String),

    /// Failure while decoding mid-stream. Ends the session, never escapes the loop.
    #[error("decode error: {0}")]
    Decode(String),

    /// Caller precondition violated. Engine state is left untouched.
    #[error("invalid state: {0}")]
    State(&'static str),

    #[error("playlist {}: {source}", path.display())]
    Playlist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings: {0}")]
    Settings(String),
}

impl PlayerError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PlayerError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
