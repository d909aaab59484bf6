//! Download command implementation.

use crate::cli::output::format_size;
use crate::cli::preflight::{self, Operation};
use crate::cli::{is_url_input, Output};
use crate::config::Settings;
use crate::cookies::CookieJar;
use crate::error::SongdlError;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Run the download command. Inputs are processed concurrently.
pub async fn run_download(
    inputs: &[String],
    output: String,
    pick: usize,
    settings: &Settings,
    cookies: Arc<CookieJar>,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Download, settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'songdl doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if pick == 0 {
        Output::error("--pick is 1-based");
        return Err(anyhow::anyhow!("--pick must be at least 1"));
    }

    let output_dir = Settings::expand_path(&output);
    std::fs::create_dir_all(&output_dir)?;

    let orchestrator = Orchestrator::new(settings, cookies);

    let spinner = Output::spinner(&format!("Downloading {} item(s)...", inputs.len()));
    let outcomes = join_all(
        inputs
            .iter()
            .map(|input| download_one(&orchestrator, input, pick)),
    )
    .await;
    spinner.finish_and_clear();

    // Written one at a time so equal titles in one batch never clobber each other.
    let mut claimed = HashSet::new();
    let mut failures = 0;
    for (input, outcome) in inputs.iter().zip(outcomes) {
        let written = match outcome {
            Ok((file_name, content)) => {
                let path = claim_path(&output_dir, &file_name, &mut claimed);
                tokio::fs::write(&path, &content)
                    .await
                    .map(|_| (path, content.len() as u64))
                    .map_err(anyhow::Error::from)
            }
            Err(e) => Err(e),
        };
        match written {
            Ok((path, bytes)) => Output::success(&format!(
                "{} ({})",
                path.display(),
                format_size(bytes)
            )),
            Err(e) => {
                failures += 1;
                Output::error(&format!("{}: {}", input, e));
            }
        }
    }

    if failures > 0 {
        return Err(anyhow::anyhow!("{} of {} downloads failed", failures, inputs.len()));
    }

    Ok(())
}

/// Resolve one input to a URL and download it, returning file name and bytes.
async fn download_one(
    orchestrator: &Orchestrator,
    input: &str,
    pick: usize,
) -> Result<(String, Vec<u8>)> {
    let url = if is_url_input(input) {
        input.trim().to_string()
    } else {
        let tracks = orchestrator.search_limit(input, pick).await?;
        let track = tracks.into_iter().nth(pick - 1).ok_or_else(|| {
            SongdlError::InvalidInput(format!("no search result #{} for '{}'", pick, input))
        })?;
        debug!("'{}' resolved to {} ({})", input, track.title, track.canonical_url);
        track.canonical_url
    };

    let result = orchestrator.download(&url).await;
    if let Some(message) = result.error_message() {
        return Err(anyhow::anyhow!("{}", message));
    }

    let file_name = result.file_name().unwrap_or("audio.mp3").to_string();
    let content = result.into_content().unwrap_or_default();
    Ok((file_name, content))
}

/// `output_dir/file_name`, or `stem (N).ext` if an earlier item in this batch took it.
fn claim_path(output_dir: &Path, file_name: &str, claimed: &mut HashSet<PathBuf>) -> PathBuf {
    let candidate = output_dir.join(file_name);
    if claimed.insert(candidate.clone()) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().into_owned());
    (2..)
        .map(|n| {
            let numbered = match &ext {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            output_dir.join(numbered)
        })
        .find(|path| claimed.insert(path.clone()))
        .unwrap_or(candidate)
}
