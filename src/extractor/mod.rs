//! Extraction collaborator abstraction.
//!
//! The extractor turns a search query into flat metadata entries, and a media
//! URL into a transcoded audio file on disk. The production implementation
//! drives yt-dlp (which in turn pipes through ffmpeg); tests substitute stubs.

mod ytdlp;

pub use ytdlp::YtDlp;

use crate::error::Result;
use crate::profile::AntiDetectionProfile;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One entry from a flat (metadata-only) search listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
}

/// Everything the extractor needs to fetch one item.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    /// Directory the extractor must write into. Owned by the job.
    pub output_dir: &'a Path,
    pub cookie_file: Option<&'a Path>,
    pub profile: &'a AntiDetectionProfile,
}

/// What the extractor reports after fetching and converting.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// Resolved media title, if the extractor reported one.
    pub title: Option<String>,
    /// File name the extractor chose before conversion. The converted file
    /// sits next to it with the target codec's extension.
    pub media_path: PathBuf,
}

/// Trait for extraction collaborators.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// List up to `max_results` entries for a free-text query without resolving streams.
    async fn search_flat(&self, query: &str, max_results: usize) -> Result<Vec<RawEntry>>;

    /// Fetch the best audio-only stream for `request.url` and convert it to MP3.
    async fn fetch_audio(&self, request: &FetchRequest<'_>) -> Result<FetchedMedia>;
}
