//! songdl - search a media platform and fetch audio as MP3
//!
//! The library turns free-text queries into ranked candidate tracks and drives
//! a chosen track through fetch, transcoding and integrity validation, handing
//! back either the audio bytes or a precise failure reason.
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `cookies` - Process-wide session cookie store
//! - `profile` - Randomized anti-detection client profiles
//! - `extractor` - Extraction collaborator abstraction (yt-dlp)
//! - `search` - Query to candidate tracks
//! - `staging` - Per-job temporary directories
//! - `sanitize` - File name sanitizing
//! - `orchestrator` - Download job state machine
//!
//! # Example
//!
//! ```rust,no_run
//! use songdl::config::Settings;
//! use songdl::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let cookies = songdl::cookies::init_from_env(&settings.cookies.env_var);
//!     let orchestrator = Orchestrator::new(&settings, cookies);
//!
//!     let tracks = orchestrator.search("lofi beats").await?;
//!     if let Some(track) = tracks.first() {
//!         let result = orchestrator.download(&track.canonical_url).await;
//!         println!("{:?}", result.file_name());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod profile;
pub mod sanitize;
pub mod search;
pub mod staging;

pub use error::{Result, SongdlError};
