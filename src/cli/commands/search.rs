//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::cookies::CookieJar;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::sync::Arc;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: Option<usize>,
    settings: &Settings,
    cookies: Arc<CookieJar>,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'songdl doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings, cookies);
    let limit = limit.unwrap_or(settings.extractor.max_results);

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search_limit(query, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(tracks) => {
            if tracks.is_empty() {
                Output::warning("No results found.");
            } else {
                Output::success(&format!("Found {} results", tracks.len()));
                println!();
                for (idx, track) in tracks.iter().enumerate() {
                    Output::track(idx + 1, &track.title, &track.canonical_url);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
