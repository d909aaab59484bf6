//! Download orchestrator.
//!
//! Drives one media item from URL to validated MP3 bytes:
//!
//! ```text
//! Pending -> Resolving -> Fetching -> Transcoding -> Validating -> Succeeded
//!     \__________\____________\____________\______________\-----> Failed
//! ```
//!
//! Every job owns a private staging directory that is removed once the job
//! reaches a terminal state, and also if the job future is dropped early.
//! Retries happen only at the connection/fragment level inside the extractor;
//! a failed job is reported to the caller, who may resubmit.

use crate::config::Settings;
use crate::cookies::CookieJar;
use crate::error::{Result, SongdlError};
use crate::extractor::{Extractor, FetchRequest, YtDlp};
use crate::profile::{AntiDetectionProfile, ProfileProvider};
use crate::sanitize::sanitize_filename;
use crate::search::{SearchService, Track};
use crate::staging::{StagingArea, StagingDir};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Content type of every successful download.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Extension of the transcoder's output.
const TARGET_EXTENSION: &str = "mp3";

/// Lifecycle of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Resolving,
    Fetching,
    Transcoding,
    Validating,
    Succeeded,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Resolving => "resolving",
            JobState::Fetching => "fetching",
            JobState::Transcoding => "transcoding",
            JobState::Validating => "validating",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One in-flight download.
#[derive(Debug)]
pub struct DownloadJob {
    pub id: Uuid,
    pub source_url: String,
    staging: StagingDir,
    profile: AntiDetectionProfile,
    state: JobState,
}

impl DownloadJob {
    fn start(source_url: &str, staging: &StagingArea, profile: AntiDetectionProfile) -> Result<Self> {
        let id = Uuid::new_v4();
        let staging = staging.acquire(id)?;
        Ok(Self {
            id,
            source_url: source_url.to_string(),
            staging,
            profile,
            state: JobState::Pending,
        })
    }

    fn transition(&mut self, next: JobState) {
        debug!(job = %self.id, "{} -> {}", self.state, next);
        self.state = next;
    }

    /// Move to a terminal state, release staging, and project the result.
    fn finish(mut self, outcome: Result<DownloadedAudio>) -> DownloadResult {
        let result = match outcome {
            Ok(audio) => {
                self.transition(JobState::Succeeded);
                info!(job = %self.id, "Downloaded '{}' ({} bytes)", audio.file_name, audio.content.len());
                DownloadResult::success(audio.file_name, audio.content)
            }
            Err(e) => {
                self.transition(JobState::Failed);
                warn!(job = %self.id, "Download failed: {}", e);
                DownloadResult::failure(e.detail())
            }
        };
        self.staging.release();
        result
    }
}

struct DownloadedAudio {
    file_name: String,
    content: Vec<u8>,
}

/// Outcome status of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Success,
    Failure,
}

/// Terminal projection of a job: either the audio payload or an error message.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    status: DownloadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(skip)]
    content: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl DownloadResult {
    fn success(file_name: String, content: Vec<u8>) -> Self {
        Self {
            status: DownloadStatus::Success,
            file_name: Some(file_name),
            content: Some(content),
            content_type: Some(AUDIO_CONTENT_TYPE.to_string()),
            error_message: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: DownloadStatus::Failure,
            file_name: None,
            content: None,
            content_type: None,
            error_message: Some(message.into()),
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Success
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Take the audio bytes, if any.
    pub fn into_content(self) -> Option<Vec<u8>> {
        self.content
    }
}

/// Coordinates search and download against one extractor.
pub struct Orchestrator {
    extractor: Arc<dyn Extractor>,
    search: SearchService,
    profiles: ProfileProvider,
    staging: StagingArea,
    min_file_size: u64,
    job_timeout: Duration,
    max_results: usize,
}

impl Orchestrator {
    /// Create an orchestrator backed by yt-dlp.
    pub fn new(settings: &Settings, cookies: Arc<CookieJar>) -> Self {
        let extractor: Arc<dyn Extractor> = Arc::new(YtDlp::new(
            settings.extractor.clone(),
            settings.transcode.quality,
        ));
        let profiles = ProfileProvider::new(settings.anti_detection.clone(), cookies);
        Self::with_components(settings, extractor, profiles)
    }

    /// Create an orchestrator with a custom extractor and profile provider.
    pub fn with_components(
        settings: &Settings,
        extractor: Arc<dyn Extractor>,
        profiles: ProfileProvider,
    ) -> Self {
        let search = SearchService::new(extractor.clone(), settings.extractor.id_url_template.clone());
        Self {
            extractor,
            search,
            profiles,
            staging: StagingArea::new(settings.temp_dir()),
            min_file_size: settings.validation.min_file_size_bytes,
            job_timeout: settings.extractor.job_timeout(),
            max_results: settings.extractor.max_results,
        }
    }

    /// Search with the configured default result count.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>> {
        self.search.search(query, self.max_results).await
    }

    /// Search for up to `max_results` candidates.
    pub async fn search_limit(&self, query: &str, max_results: usize) -> Result<Vec<Track>> {
        self.search.search(query, max_results).await
    }

    /// Download `url` as MP3. Always returns a result; never leaves staging behind.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download(&self, url: &str) -> DownloadResult {
        let url = url.trim();
        if url.is_empty() {
            return DownloadResult::failure(SongdlError::InvalidInput("URL is empty".into()).detail());
        }

        let mut job = match DownloadJob::start(url, &self.staging, self.profiles.new_profile()) {
            Ok(job) => job,
            Err(e) => {
                warn!("Could not allocate staging: {}", e);
                return DownloadResult::failure(e.detail());
            }
        };
        info!(job = %job.id, "Starting download");

        let outcome = self.run(&mut job).await;
        job.finish(outcome)
    }

    async fn run(&self, job: &mut DownloadJob) -> Result<DownloadedAudio> {
        job.transition(JobState::Resolving);
        let cookie_file = match &job.profile.cookie_jar {
            Some(jar) => Some(job.staging.write_cookie_file(jar)?),
            None => None,
        };

        tokio::time::sleep(self.profiles.pre_request_delay()).await;

        job.transition(JobState::Fetching);
        let request = FetchRequest {
            url: &job.source_url,
            output_dir: job.staging.path(),
            cookie_file: cookie_file.as_deref(),
            profile: &job.profile,
        };
        let fetched = tokio::time::timeout(self.job_timeout, self.extractor.fetch_audio(&request))
            .await
            .map_err(|_| {
                SongdlError::FetchFailed(format!(
                    "timed out after {} seconds",
                    self.job_timeout.as_secs()
                ))
            })??;

        job.transition(JobState::Transcoding);
        let output = fetched.media_path.with_extension(TARGET_EXTENSION);
        if !output.is_file() {
            return Err(SongdlError::TranscodeFailed(format!(
                "expected output {} was not produced",
                output.display()
            )));
        }

        job.transition(JobState::Validating);
        let bytes = tokio::fs::metadata(&output).await?.len();
        if bytes < self.min_file_size {
            return Err(SongdlError::IncompleteDownload {
                bytes,
                minimum: self.min_file_size,
            });
        }

        let content = tokio::fs::read(&output).await?;
        let title = fetched
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| output.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_default();

        Ok(DownloadedAudio {
            file_name: display_file_name(&title),
            content,
        })
    }
}

/// `<sanitized title>.mp3`, falling back to a generic stem.
fn display_file_name(title: &str) -> String {
    let stem = sanitize_filename(title);
    let stem = stem.trim();
    if stem.is_empty() {
        format!("audio.{}", TARGET_EXTENSION)
    } else {
        format!("{}.{}", stem, TARGET_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AntiDetectionSettings;
    use crate::cookies::Cookie;
    use crate::extractor::{FetchedMedia, RawEntry};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
    const MB: usize = 1024 * 1024;

    /// Writes a fake `<title>.webm` + `<title>.mp3` pair into the staging directory.
    struct StubExtractor {
        title: Option<String>,
        mp3_size: Option<usize>,
        failure: Option<fn() -> SongdlError>,
        delay: Duration,
        seen_dirs: Mutex<Vec<PathBuf>>,
        seen_cookies: Mutex<Vec<String>>,
    }

    impl StubExtractor {
        fn producing(title: &str, mp3_size: usize) -> Self {
            Self {
                title: Some(title.to_string()),
                mp3_size: Some(mp3_size),
                failure: None,
                delay: Duration::ZERO,
                seen_dirs: Mutex::new(Vec::new()),
                seen_cookies: Mutex::new(Vec::new()),
            }
        }

        fn dirs(&self) -> Vec<PathBuf> {
            self.seen_dirs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Extractor for StubExtractor {
        async fn search_flat(&self, _query: &str, _max_results: usize) -> Result<Vec<RawEntry>> {
            Ok(vec![RawEntry {
                id: Some("dQw4w9WgXcQ".into()),
                title: Some("Stub".into()),
                webpage_url: None,
            }])
        }

        async fn fetch_audio(&self, request: &FetchRequest<'_>) -> Result<FetchedMedia> {
            self.seen_dirs.lock().unwrap().push(request.output_dir.to_path_buf());
            if let Some(path) = request.cookie_file {
                self.seen_cookies.lock().unwrap().push(std::fs::read_to_string(path)?);
            }

            let stem = "stub-output";
            let source = request.output_dir.join(format!("{stem}.webm"));
            std::fs::write(&source, b"intermediate")?;

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(make_err) = self.failure {
                return Err(make_err());
            }
            if let Some(size) = self.mp3_size {
                std::fs::write(request.output_dir.join(format!("{stem}.mp3")), vec![0xFFu8; size])?;
            }

            Ok(FetchedMedia {
                title: self.title.clone(),
                media_path: source,
            })
        }
    }

    fn quiet_profiles(cookies: CookieJar) -> ProfileProvider {
        let settings = AntiDetectionSettings {
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            ..Default::default()
        };
        ProfileProvider::with_seed(settings, Arc::new(cookies), 11)
    }

    fn orchestrator(root: &Path, extractor: Arc<StubExtractor>) -> Orchestrator {
        orchestrator_with(root, extractor, CookieJar::default(), 600)
    }

    fn orchestrator_with(
        root: &Path,
        extractor: Arc<StubExtractor>,
        cookies: CookieJar,
        job_timeout_secs: u64,
    ) -> Orchestrator {
        let mut settings = Settings::default();
        settings.general.temp_dir = root.to_string_lossy().into_owned();
        settings.extractor.job_timeout_secs = job_timeout_secs;
        Orchestrator::with_components(&settings, extractor, quiet_profiles(cookies))
    }

    fn assert_staging_empty(root: &Path) {
        let leftovers: Vec<_> = std::fs::read_dir(root).unwrap().flatten().collect();
        assert!(leftovers.is_empty(), "staging leaked: {:?}", leftovers);
    }

    fn assert_exclusive(result: &DownloadResult) {
        let has_payload = result.content().is_some() && result.file_name().is_some();
        assert!(has_payload != result.error_message().is_some());
    }

    #[tokio::test]
    async fn test_successful_download() {
        let root = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::producing("My:Song/Title?", 2 * MB));
        let orch = orchestrator(root.path(), extractor.clone());

        let result = orch.download(URL).await;

        assert!(result.is_success(), "{:?}", result.error_message());
        assert_eq!(result.content_type(), Some("audio/mpeg"));
        assert_eq!(result.file_name(), Some("MySongTitle.mp3"));
        assert_eq!(result.content().map(|c| c.len()), Some(2 * MB));
        assert!(result.content().unwrap().len() as u64 > Settings::default().validation.min_file_size_bytes);
        assert_exclusive(&result);
        assert!(!extractor.dirs()[0].exists());
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_undersized_output_fails_with_byte_count() {
        let root = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::producing("Stub", 9 * 1024));
        let orch = orchestrator(root.path(), extractor);

        let result = orch.download(URL).await;

        assert_eq!(result.status(), DownloadStatus::Failure);
        let message = result.error_message().unwrap();
        assert!(message.contains("too small"));
        assert!(message.contains("9216"));
        assert_exclusive(&result);
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_extractor_error_message_is_surfaced() {
        let root = tempfile::tempdir().unwrap();
        let mut stub = StubExtractor::producing("Stub", 2 * MB);
        stub.failure = Some(|| SongdlError::ResolutionFailed("Private video".into()));
        let orch = orchestrator(root.path(), Arc::new(stub));

        let result = orch.download(URL).await;

        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("Private video"));
        assert!(result.content().is_none());
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_missing_transcoder_output() {
        let root = tempfile::tempdir().unwrap();
        let mut stub = StubExtractor::producing("Stub", 0);
        stub.mp3_size = None;
        let orch = orchestrator(root.path(), Arc::new(stub));

        let result = orch.download(URL).await;

        assert!(result.error_message().unwrap().starts_with("expected output"));
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_title_falls_back_to_file_stem() {
        let root = tempfile::tempdir().unwrap();
        let mut stub = StubExtractor::producing("", 2 * MB);
        stub.title = None;
        let orch = orchestrator(root.path(), Arc::new(stub));

        let result = orch.download(URL).await;
        assert_eq!(result.file_name(), Some("stub-output.mp3"));
    }

    #[tokio::test]
    async fn test_job_timeout_still_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let mut stub = StubExtractor::producing("Slow", 2 * MB);
        stub.delay = Duration::from_secs(30);
        let orch = orchestrator_with(root.path(), Arc::new(stub), CookieJar::default(), 0);

        let result = orch.download(URL).await;

        assert!(result.error_message().unwrap().contains("timed out"));
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_cancelled_job_releases_staging() {
        let root = tempfile::tempdir().unwrap();
        let mut stub = StubExtractor::producing("Slow", 2 * MB);
        stub.delay = Duration::from_secs(30);
        let extractor = Arc::new(stub);
        let orch = orchestrator(root.path(), extractor.clone());

        let cancelled = tokio::time::timeout(Duration::from_millis(200), orch.download(URL)).await;

        assert!(cancelled.is_err());
        assert_eq!(extractor.dirs().len(), 1);
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::producing("Same", 2 * MB));
        let orch = orchestrator(root.path(), extractor.clone());

        let (a, b) = tokio::join!(orch.download(URL), orch.download(URL));

        assert!(a.is_success() && b.is_success());
        let dirs = extractor.dirs();
        assert_eq!(dirs.len(), 2);
        assert_ne!(dirs[0], dirs[1]);
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_cookie_file_materialized_for_extractor() {
        let root = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::producing("Stub", 2 * MB));
        let jar = CookieJar::new(vec![Cookie {
            name: "SID".into(),
            value: "abc".into(),
            domain: ".youtube.com".into(),
            path: "/".into(),
        }]);
        let orch = orchestrator_with(root.path(), extractor.clone(), jar, 600);

        assert!(orch.download(URL).await.is_success());

        let cookies = extractor.seen_cookies.lock().unwrap().clone();
        assert_eq!(cookies, vec!["SID=abc; Domain=.youtube.com; Path=/\n".to_string()]);
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_empty_url_rejected_without_staging() {
        let root = tempfile::tempdir().unwrap();
        let extractor = Arc::new(StubExtractor::producing("Stub", 2 * MB));
        let orch = orchestrator(root.path(), extractor.clone());

        let result = orch.download("   ").await;

        assert!(!result.is_success());
        assert!(extractor.dirs().is_empty());
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_search_uses_same_extractor() {
        let root = tempfile::tempdir().unwrap();
        let orch = orchestrator(root.path(), Arc::new(StubExtractor::producing("Stub", 0)));
        let tracks = orch.search("lofi beats").await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].canonical_url, URL);
    }

    #[test]
    fn test_display_file_name() {
        assert_eq!(display_file_name("My:Song/Title?"), "MySongTitle.mp3");
        assert_eq!(display_file_name("???"), "audio.mp3");
    }

    #[tokio::test]
    async fn test_output_at_exact_threshold_passes() {
        let root = tempfile::tempdir().unwrap();
        let minimum = Settings::default().validation.min_file_size_bytes as usize;
        let orch = orchestrator(root.path(), Arc::new(StubExtractor::producing("Edge", minimum)));

        let result = orch.download(URL).await;

        assert!(result.is_success(), "{:?}", result.error_message());
        assert_eq!(result.content().map(|c| c.len()), Some(minimum));
        assert_staging_empty(root.path());
    }

    #[tokio::test]
    async fn test_one_byte_below_threshold_fails() {
        let root = tempfile::tempdir().unwrap();
        let minimum = Settings::default().validation.min_file_size_bytes as usize;
        let orch = orchestrator(root.path(), Arc::new(StubExtractor::producing("Edge", minimum - 1)));

        let result = orch.download(URL).await;

        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains(&(minimum - 1).to_string()));
    }

    #[test]
    fn test_failure_serializes_without_payload() {
        let json = serde_json::to_value(DownloadResult::failure("boom")).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error_message"], "boom");
        assert!(json.get("file_name").is_none());
    }
}
