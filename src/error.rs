//! Error types for songdl.

use thiserror::Error;

/// Library-level error type for songdl operations.
#[derive(Error, Debug)]
pub enum SongdlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Could not resolve media: {0}")]
    ResolutionFailed(String),

    #[error("Download failed: {0}")]
    FetchFailed(String),

    #[error(
        "Downloaded file is too small ({bytes} bytes, minimum {minimum}); \
         the download is incomplete or corrupt"
    )]
    IncompleteDownload { bytes: u64, minimum: u64 },

    #[error("Audio conversion failed: {0}")]
    TranscodeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SongdlError {
    /// The underlying message, without the category prefix `Display` adds.
    pub fn detail(&self) -> String {
        match self {
            SongdlError::Config(m)
            | SongdlError::SearchUnavailable(m)
            | SongdlError::ResolutionFailed(m)
            | SongdlError::FetchFailed(m)
            | SongdlError::TranscodeFailed(m)
            | SongdlError::InvalidInput(m) => m.clone(),
            SongdlError::Io(e) => e.to_string(),
            SongdlError::Json(e) => e.to_string(),
            SongdlError::TomlParse(e) => e.to_string(),
            SongdlError::IncompleteDownload { .. } | SongdlError::ToolNotFound(_) => self.to_string(),
        }
    }
}

/// Result type alias for songdl operations.
pub type Result<T> = std::result::Result<T, SongdlError>;
