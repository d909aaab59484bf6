//! yt-dlp backed extractor.

use super::{Extractor, FetchRequest, FetchedMedia, RawEntry};
use crate::config::{AudioQuality, ExtractorSettings};
use crate::error::{Result, SongdlError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Pulls the message out of yt-dlp's `ERROR: [extractor] id: message` lines.
static ERROR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^ERROR:\s*(?:\[[^\]]+\]\s*)?(?:[\w-]+:\s+)?(.+)$").expect("Invalid regex")
});

#[derive(Deserialize)]
struct SearchListing {
    #[serde(default)]
    entries: Vec<Option<RawEntry>>,
}

/// Extractor that shells out to yt-dlp.
pub struct YtDlp {
    settings: ExtractorSettings,
    quality: AudioQuality,
}

impl YtDlp {
    pub fn new(settings: ExtractorSettings, quality: AudioQuality) -> Self {
        Self { settings, quality }
    }

    /// Arguments for a flat search listing.
    pub fn search_args(&self, query: &str, max_results: usize) -> Vec<String> {
        vec![
            "--flat-playlist".into(),
            "--dump-single-json".into(),
            "--skip-download".into(),
            "--no-playlist".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--socket-timeout".into(),
            self.settings.socket_timeout_secs.to_string(),
            format!("ytsearch{}:{}", max_results, query),
        ]
    }

    /// Arguments for fetching and converting a single item.
    pub fn download_args(&self, req: &FetchRequest<'_>) -> Vec<String> {
        let s = &self.settings;
        let profile = req.profile;
        let template = req.output_dir.join("%(title)s.%(ext)s");

        let mut args: Vec<String> = vec![
            "--format".into(),
            "bestaudio/best".into(),
            "--no-playlist".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            format!("{}K", self.quality.bitrate_kbps()),
            "--output".into(),
            template.to_string_lossy().into_owned(),
            "--user-agent".into(),
            profile.user_agent.clone(),
        ];

        for (name, value) in &profile.extra_headers {
            args.push("--add-header".into());
            args.push(format!("{}:{}", name, value));
        }

        args.extend([
            "--socket-timeout".into(),
            s.socket_timeout_secs.to_string(),
            "--retries".into(),
            s.retries.to_string(),
            "--fragment-retries".into(),
            s.fragment_retries.to_string(),
            "--no-check-certificates".into(),
            "--geo-bypass".into(),
            "--geo-bypass-country".into(),
            s.geo_bypass_country.clone(),
            "--http-chunk-size".into(),
            s.http_chunk_size.clone(),
            "--concurrent-fragments".into(),
            s.concurrent_fragments.to_string(),
            "--sleep-interval".into(),
            profile.sleep_interval_secs.0.to_string(),
            "--max-sleep-interval".into(),
            profile.max_sleep_interval_secs.to_string(),
            "--limit-rate".into(),
            profile.throttle_bytes_per_sec.to_string(),
        ]);

        if let Some(ffmpeg) = &s.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone());
        }

        // yt-dlp only parses Netscape jars from --cookies and skips other lines,
        // so the session is also sent as an explicit header.
        if let Some(cookies) = req.cookie_file {
            args.push("--cookies".into());
            args.push(cookies.to_string_lossy().into_owned());
        }
        if let Some(jar) = profile.cookie_jar.as_ref().filter(|j| !j.is_empty()) {
            args.push("--add-header".into());
            args.push(format!("Cookie:{}", jar.header_value()));
        }

        args.extend([
            "--dump-json".into(),
            "--no-simulate".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--no-progress".into(),
            req.url.to_string(),
        ]);

        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.settings.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> SongdlError {
        if e.kind() == std::io::ErrorKind::NotFound {
            SongdlError::ToolNotFound(self.settings.binary.clone())
        } else {
            SongdlError::FetchFailed(format!("{} execution failed: {e}", self.settings.binary))
        }
    }
}

#[async_trait]
impl Extractor for YtDlp {
    #[instrument(skip(self))]
    async fn search_flat(&self, query: &str, max_results: usize) -> Result<Vec<RawEntry>> {
        let args = self.search_args(query, max_results);
        let run = self.command(&args).output();

        let output = match tokio::time::timeout(self.settings.search_timeout(), run).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SongdlError::ToolNotFound(self.settings.binary.clone()));
            }
            Ok(Err(e)) => {
                return Err(SongdlError::SearchUnavailable(format!("{} execution failed: {e}", self.settings.binary)));
            }
            Err(_) => {
                return Err(SongdlError::SearchUnavailable(format!(
                    "search timed out after {} seconds",
                    self.settings.search_timeout_secs
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SongdlError::SearchUnavailable(error_message(&stderr)));
        }

        let listing: SearchListing = serde_json::from_slice(&output.stdout)
            .map_err(|e| SongdlError::SearchUnavailable(format!("unreadable search listing: {e}")))?;

        let entries: Vec<RawEntry> = listing.entries.into_iter().flatten().collect();
        debug!("Search returned {} raw entries", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn fetch_audio(&self, request: &FetchRequest<'_>) -> Result<FetchedMedia> {
        let args = self.download_args(request);
        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        parse_fetch_report(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Read the info JSON yt-dlp prints for the downloaded item.
fn parse_fetch_report(stdout: &str) -> Result<FetchedMedia> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| SongdlError::FetchFailed("extractor produced no metadata".into()))?;

    let json: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| SongdlError::FetchFailed(format!("unreadable extractor metadata: {e}")))?;

    let media_path = json["filename"]
        .as_str()
        .or_else(|| json["_filename"].as_str())
        .map(PathBuf::from)
        .ok_or_else(|| SongdlError::FetchFailed("extractor did not report an output file".into()))?;

    Ok(FetchedMedia {
        title: json["title"].as_str().map(|s| s.to_string()),
        media_path,
    })
}

/// Map yt-dlp stderr to the matching error kind.
fn classify_failure(stderr: &str) -> SongdlError {
    let message = error_message(stderr);
    let lower = stderr.to_lowercase();

    const RESOLUTION: &[&str] = &[
        "unsupported url",
        "private video",
        "video unavailable",
        "is not a valid url",
        "available in your country",
        "geo restricted",
        "sign in to confirm your age",
        "this video has been removed",
        "incomplete youtube id",
    ];
    const TRANSCODE: &[&str] = &["postprocessing", "ffmpeg", "ffprobe", "audio conversion failed"];

    if RESOLUTION.iter().any(|p| lower.contains(p)) {
        SongdlError::ResolutionFailed(message)
    } else if TRANSCODE.iter().any(|p| lower.contains(p)) {
        SongdlError::TranscodeFailed(message)
    } else {
        SongdlError::FetchFailed(message)
    }
}

/// The last `ERROR:` message in stderr, or the trimmed stderr itself.
fn error_message(stderr: &str) -> String {
    ERROR_LINE
        .captures_iter(stderr)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| {
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                "extractor exited with an error".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{Cookie, CookieJar};
    use crate::profile::AntiDetectionProfile;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::path::Path;

    fn profile() -> AntiDetectionProfile {
        let mut headers = BTreeMap::new();
        headers.insert("Accept-Language".to_string(), "en-GB,en;q=0.9".to_string());
        AntiDetectionProfile {
            user_agent: "TestAgent/1.0".to_string(),
            extra_headers: headers,
            sleep_interval_secs: (2, 4),
            max_sleep_interval_secs: 5,
            throttle_bytes_per_sec: 500_000,
            cookie_jar: None,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn test_download_args_carry_policy() {
        let ytdlp = YtDlp::new(ExtractorSettings::default(), AudioQuality::High);
        let profile = profile();
        let req = FetchRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            output_dir: Path::new("/tmp/stage"),
            cookie_file: Some(Path::new("/tmp/stage/cookies.txt")),
            profile: &profile,
        };
        let args = ytdlp.download_args(&req);

        assert_eq!(value_after(&args, "--format"), Some("bestaudio/best"));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(&args, "--audio-quality"), Some("320K"));
        assert_eq!(value_after(&args, "--user-agent"), Some("TestAgent/1.0"));
        assert_eq!(value_after(&args, "--add-header"), Some("Accept-Language:en-GB,en;q=0.9"));
        assert_eq!(value_after(&args, "--socket-timeout"), Some("30"));
        assert_eq!(value_after(&args, "--retries"), Some("10"));
        assert_eq!(value_after(&args, "--fragment-retries"), Some("10"));
        assert_eq!(value_after(&args, "--geo-bypass-country"), Some("US"));
        assert_eq!(value_after(&args, "--http-chunk-size"), Some("10M"));
        assert_eq!(value_after(&args, "--concurrent-fragments"), Some("10"));
        assert_eq!(value_after(&args, "--sleep-interval"), Some("2"));
        assert_eq!(value_after(&args, "--max-sleep-interval"), Some("5"));
        assert_eq!(value_after(&args, "--limit-rate"), Some("500000"));
        assert_eq!(value_after(&args, "--cookies"), Some("/tmp/stage/cookies.txt"));
        assert_eq!(value_after(&args, "--output"), Some("/tmp/stage/%(title)s.%(ext)s"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--no-check-certificates".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("Cookie:")));
        assert_eq!(args.last().map(|s| s.as_str()), Some(req.url));
    }

    #[test]
    fn test_session_cookies_sent_as_header() {
        let ytdlp = YtDlp::new(ExtractorSettings::default(), AudioQuality::Standard);
        let mut profile = profile();
        profile.cookie_jar = Some(Arc::new(CookieJar::new(vec![
            Cookie {
                name: "SID".into(),
                value: "abc".into(),
                domain: ".youtube.com".into(),
                path: "/".into(),
            },
            Cookie {
                name: "HSID".into(),
                value: "def".into(),
                domain: ".youtube.com".into(),
                path: "/".into(),
            },
        ])));
        let req = FetchRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            output_dir: Path::new("/tmp/stage"),
            cookie_file: Some(Path::new("/tmp/stage/cookies.txt")),
            profile: &profile,
        };
        let args = ytdlp.download_args(&req);

        assert!(args.contains(&"Cookie:SID=abc; HSID=def".to_string()));
        assert_eq!(value_after(&args, "--cookies"), Some("/tmp/stage/cookies.txt"));
    }

    #[test]
    fn test_search_args() {
        let ytdlp = YtDlp::new(ExtractorSettings::default(), AudioQuality::Standard);
        let args = ytdlp.search_args("lofi beats", 5);
        assert!(args.contains(&"--flat-playlist".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(args.last().map(|s| s.as_str()), Some("ytsearch5:lofi beats"));
    }

    #[test]
    fn test_classify_failure() {
        let private = "ERROR: [youtube] abc123def45: Private video. Sign in if you've been granted access";
        assert!(matches!(classify_failure(private), SongdlError::ResolutionFailed(m) if m.starts_with("Private video")));

        let geo = "ERROR: [youtube] abc123def45: The uploader has not made this video available in your country";
        assert!(matches!(classify_failure(geo), SongdlError::ResolutionFailed(_)));

        let post = "ERROR: Postprocessing: audio conversion failed: Invalid data found";
        assert!(matches!(classify_failure(post), SongdlError::TranscodeFailed(_)));

        let net = "ERROR: unable to download video data: HTTP Error 403: Forbidden";
        assert!(matches!(classify_failure(net), SongdlError::FetchFailed(m) if m.contains("403")));
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(""), "extractor exited with an error");
        assert_eq!(error_message("  boom \n"), "boom");
    }

    #[test]
    fn test_parse_fetch_report() {
        let stdout = "{\"title\": \"My:Song\", \"filename\": \"/tmp/stage/My#Song.webm\"}\n";
        let media = parse_fetch_report(stdout).unwrap();
        assert_eq!(media.title.as_deref(), Some("My:Song"));
        assert_eq!(media.media_path, PathBuf::from("/tmp/stage/My#Song.webm"));

        assert!(parse_fetch_report("").is_err());
        assert!(parse_fetch_report("{\"title\": \"x\"}").is_err());
    }

    #[test]
    fn test_search_listing_skips_null_entries() {
        let listing: SearchListing = serde_json::from_str(
            r#"{"entries": [{"id": "a1", "title": "One"}, null, {"webpage_url": "https://www.youtube.com/watch?v=b2"}]}"#,
        )
        .unwrap();
        let entries: Vec<RawEntry> = listing.entries.into_iter().flatten().collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].title.is_none());
    }
}
