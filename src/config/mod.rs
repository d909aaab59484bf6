//! Configuration module for songdl.
//!
//! Deployment parameters: listening address, extractor and transcoder
//! locations, quality tier, size threshold and pacing.

mod settings;

pub use settings::{
    AntiDetectionSettings, AudioQuality, CookieSettings, ExtractorSettings, GeneralSettings,
    ServerSettings, Settings, TranscodeSettings, ValidationSettings,
};
