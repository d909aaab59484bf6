//! Configuration settings for songdl.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub extractor: ExtractorSettings,
    pub transcode: TranscodeSettings,
    pub validation: ValidationSettings,
    pub anti_detection: AntiDetectionSettings,
    pub cookies: CookieSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Root under which per-job staging directories are created.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/songdl".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Settings for the extraction tool (yt-dlp) and its network behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Extractor binary name or path.
    pub binary: String,
    /// Directory or path of the ffmpeg binary used for transcoding.
    pub ffmpeg_location: Option<String>,
    pub socket_timeout_secs: u64,
    /// Per-connection retry budget.
    pub retries: u32,
    /// Per-fragment retry budget.
    pub fragment_retries: u32,
    /// HTTP chunk size in extractor notation (e.g. "10M").
    pub http_chunk_size: String,
    /// Maximum fragments fetched in parallel.
    pub concurrent_fragments: u32,
    /// Two-letter country code presented when bypassing geo restrictions.
    pub geo_bypass_country: String,
    /// Template used to build a canonical URL from a bare media ID. `{id}` is replaced.
    pub id_url_template: String,
    /// Upper bound on a search call.
    pub search_timeout_secs: u64,
    /// Upper bound on fetch + transcode for a single job.
    pub job_timeout_secs: u64,
    /// Default number of search results.
    pub max_results: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            ffmpeg_location: None,
            socket_timeout_secs: 30,
            retries: 10,
            fragment_retries: 10,
            http_chunk_size: "10M".to_string(),
            concurrent_fragments: 10,
            geo_bypass_country: "US".to_string(),
            id_url_template: "https://www.youtube.com/watch?v={id}".to_string(),
            search_timeout_secs: 60,
            job_timeout_secs: 600,
            max_results: 5,
        }
    }
}

impl ExtractorSettings {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// MP3 quality tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    /// 192 kbps.
    #[default]
    Standard,
    /// 320 kbps.
    High,
}

impl AudioQuality {
    /// Target bitrate in kbps.
    pub fn bitrate_kbps(self) -> u32 {
        match self {
            AudioQuality::Standard => 192,
            AudioQuality::High => 320,
        }
    }
}

impl std::str::FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "192" | "192k" => Ok(AudioQuality::Standard),
            "high" | "320" | "320k" => Ok(AudioQuality::High),
            _ => Err(format!("Unknown audio quality: {}", s)),
        }
    }
}

impl std::fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioQuality::Standard => write!(f, "standard"),
            AudioQuality::High => write!(f, "high"),
        }
    }
}

/// Transcoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TranscodeSettings {
    pub quality: AudioQuality,
}

/// Output integrity checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Outputs smaller than this are treated as truncated or bogus.
    pub min_file_size_bytes: u64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_file_size_bytes: 1024 * 1024,
        }
    }
}

/// Pacing parameters used when building anti-detection profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiDetectionSettings {
    /// Lower bound for the randomized inter-request sleep, in seconds.
    pub sleep_min_secs: u64,
    /// Upper bound for the randomized inter-request sleep, in seconds.
    pub sleep_max_secs: u64,
    /// Hard cap for any inter-request sleep.
    pub max_sleep_interval_secs: u64,
    pub throttle_bytes_per_sec: u64,
    /// Pre-request jitter window, in milliseconds.
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl Default for AntiDetectionSettings {
    fn default() -> Self {
        Self {
            sleep_min_secs: 1,
            sleep_max_secs: 5,
            max_sleep_interval_secs: 5,
            throttle_bytes_per_sec: 1024 * 1024,
            jitter_min_ms: 500,
            jitter_max_ms: 2500,
        }
    }
}

/// Session cookie import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Environment variable holding a base64-encoded JSON cookie array.
    pub env_var: String,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            env_var: "SONGDL_COOKIES".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SongdlError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject combinations that would make the random ranges empty.
    pub fn validate(&self) -> crate::error::Result<()> {
        let ad = &self.anti_detection;
        if ad.sleep_min_secs > ad.sleep_max_secs {
            return Err(crate::error::SongdlError::Config(format!(
                "anti_detection.sleep_min_secs ({}) exceeds sleep_max_secs ({})",
                ad.sleep_min_secs, ad.sleep_max_secs
            )));
        }
        if ad.jitter_min_ms > ad.jitter_max_ms {
            return Err(crate::error::SongdlError::Config(format!(
                "anti_detection.jitter_min_ms ({}) exceeds jitter_max_ms ({})",
                ad.jitter_min_ms, ad.jitter_max_ms
            )));
        }
        if !self.extractor.id_url_template.contains("{id}") {
            return Err(crate::error::SongdlError::Config(
                "extractor.id_url_template must contain {id}".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("songdl")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded staging root.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [transcode]
            quality = "high"

            [validation]
            min_file_size_bytes = 102400
            "#,
        )
        .unwrap();

        assert_eq!(settings.transcode.quality.bitrate_kbps(), 320);
        assert_eq!(settings.validation.min_file_size_bytes, 102_400);
        assert_eq!(settings.extractor.socket_timeout_secs, 30);
        assert_eq!(settings.extractor.retries, 10);
        assert_eq!(settings.server.port, 8000);
    }

    #[test]
    fn test_validate_rejects_inverted_jitter() {
        let mut settings = Settings::default();
        settings.anti_detection.jitter_min_ms = 3000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("320k".parse::<AudioQuality>().unwrap(), AudioQuality::High);
        assert_eq!("Standard".parse::<AudioQuality>().unwrap(), AudioQuality::Standard);
        assert!("lossless".parse::<AudioQuality>().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.validation.min_file_size_bytes, 1024 * 1024);
    }
}
