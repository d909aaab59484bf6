//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools are available before starting operations
//! that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, SongdlError};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Downloading needs the extractor and ffmpeg.
    Download,
    /// Searching needs only the extractor.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_tool(&settings.extractor.binary, "--version")?;
    if let Operation::Download = operation {
        check_tool(&ffmpeg_binary(settings), "-version")?;
    }
    Ok(())
}

/// The ffmpeg binary the extractor will use.
///
/// `ffmpeg_location` may name either the binary or its directory.
pub fn ffmpeg_binary(settings: &Settings) -> String {
    match &settings.extractor.ffmpeg_location {
        Some(location) => {
            let path = Settings::expand_path(location);
            if path.is_dir() {
                path.join("ffmpeg").to_string_lossy().into_owned()
            } else {
                path.to_string_lossy().into_owned()
            }
        }
        None => "ffmpeg".to_string(),
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_arg: &str) -> Result<()> {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(SongdlError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SongdlError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(SongdlError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
