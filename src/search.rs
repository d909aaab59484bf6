//! Candidate search.
//!
//! Turns a free-text query into an ordered list of [`Track`]s, each carrying a
//! fully-qualified URL that can be handed straight to the download
//! orchestrator. Entries that cannot be given such a URL are dropped.

use crate::error::{Result, SongdlError};
use crate::extractor::{Extractor, RawEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Title used when the extractor does not report one.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// A search candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    #[serde(rename = "url")]
    pub canonical_url: String,
}

/// Query-to-candidates service backed by an [`Extractor`].
pub struct SearchService {
    extractor: Arc<dyn Extractor>,
    id_url_template: String,
}

impl SearchService {
    pub fn new(extractor: Arc<dyn Extractor>, id_url_template: impl Into<String>) -> Self {
        Self {
            extractor,
            id_url_template: id_url_template.into(),
        }
    }

    /// Search for up to `max_results` candidates, in extractor (relevance) order.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SongdlError::InvalidInput("search query is empty".into()));
        }
        if max_results == 0 {
            return Err(SongdlError::InvalidInput("max results must be at least 1".into()));
        }

        let entries = self.extractor.search_flat(query, max_results).await?;
        let raw_count = entries.len();

        let tracks: Vec<Track> = entries
            .into_iter()
            .filter_map(|entry| normalize_entry(entry, &self.id_url_template))
            .take(max_results)
            .collect();

        debug!("Kept {} of {} entries", tracks.len(), raw_count);
        Ok(tracks)
    }
}

/// Normalize a raw entry, or `None` if no absolute URL can be derived for it.
pub fn normalize_entry(entry: RawEntry, id_url_template: &str) -> Option<Track> {
    let canonical_url = entry
        .webpage_url
        .as_deref()
        .and_then(absolute_url)
        .or_else(|| {
            let id = entry.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
            absolute_url(&id_url_template.replace("{id}", id))
        })?;

    let title = entry
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    Some(Track { title, canonical_url })
}

fn absolute_url(candidate: &str) -> Option<String> {
    let parsed = Url::parse(candidate.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed.to_string()),
        _ => None,
    }
}
