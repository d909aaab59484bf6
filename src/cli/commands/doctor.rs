//! Doctor command - verify system requirements and configuration.

use crate::cli::output::format_size;
use crate::cli::preflight::ffmpeg_binary;
use crate::cli::Output;
use crate::config::Settings;
use crate::cookies::CookieJar;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("songdl Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tools = [
        check_tool("extractor", &settings.extractor.binary, "--version", install_hint_ytdlp()),
        check_tool("transcoder", &ffmpeg_binary(settings), "-version", install_hint_ffmpeg()),
    ];
    for check in &tools {
        check.print();
    }
    checks.extend(tools);

    println!();

    println!("{}", style("Session Cookies").bold());
    let cookie_check = check_cookies(&settings.cookies.env_var);
    cookie_check.print();
    checks.push(cookie_check);

    println!();

    println!("{}", style("Staging").bold());
    let staging_check = check_staging(settings);
    staging_check.print();
    checks.push(staging_check);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);
    Output::kv("Quality", &format!(
        "{} ({} kbps)",
        settings.transcode.quality,
        settings.transcode.quality.bitrate_kbps()
    ));
    Output::kv("Minimum file size", &format_size(settings.validation.min_file_size_bytes));

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using songdl.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! songdl is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(label: &str, binary: &str, version_arg: &str, hint: &str) -> CheckResult {
    let name = format!("{} ({})", label, binary);
    match Command::new(binary).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(&name, &version_display)
        }
        Ok(_) => CheckResult::error(&name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(&name, "not found", hint)
        }
        Err(e) => CheckResult::error(&name, &format!("error: {}", e), hint),
    }
}

/// Check whether session cookies are configured and decodable.
fn check_cookies(var: &str) -> CheckResult {
    match std::env::var(var) {
        Ok(encoded) if !encoded.trim().is_empty() => match CookieJar::decode(&encoded) {
            Ok(jar) => CheckResult::ok(var, &format!("{} cookie(s)", jar.len())),
            Err(e) => CheckResult::warning(
                var,
                &format!("not usable ({})", e),
                "Expected base64 of a JSON array of {name, value, domain, path}",
            ),
        },
        _ => CheckResult::ok(var, "not set (downloads run without cookies)"),
    }
}

/// Check that the staging root can be created and written.
fn check_staging(settings: &Settings) -> CheckResult {
    let root = settings.temp_dir();
    let probe = root.join(".songdl-probe");
    let writable = std::fs::create_dir_all(&root)
        .and_then(|_| std::fs::write(&probe, b""))
        .and_then(|_| std::fs::remove_file(&probe));

    match writable {
        Ok(()) => CheckResult::ok("Staging root", &format!("{}", root.display())),
        Err(e) => CheckResult::error(
            "Staging root",
            &format!("{} ({})", root.display(), e),
            "Set general.temp_dir to a writable directory",
        ),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: songdl config edit",
        )
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_missing_tool_is_error() {
        let result = check_tool("extractor", "songdl-no-such-binary", "--version", "install it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, "not found");
    }

    #[test]
    fn test_staging_check_on_writable_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.temp_dir = dir.path().join("stage").to_string_lossy().into_owned();
        assert_eq!(check_staging(&settings).status, CheckStatus::Ok);
    }
}
