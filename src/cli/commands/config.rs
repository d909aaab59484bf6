//! `songdl config`: inspect or edit the active settings file.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Run the config command against `config_path` (the `--config` file or the default).
pub fn run_config(action: &ConfigAction, settings: &Settings, config_path: PathBuf) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let source = if config_path.exists() {
                config_path.display().to_string()
            } else {
                "built-in defaults".to_string()
            };
            println!("# songdl settings ({})", source);
            println!("{}", render(settings)?);
        }

        ConfigAction::Edit => edit(settings, &config_path)?,

        ConfigAction::Path => println!("{}", config_path.display()),
    }

    Ok(())
}

fn render(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(settings).context("Failed to serialize settings")
}

/// Seed the file with the current settings if needed, open it, then re-validate it.
fn edit(settings: &Settings, config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        settings.save_to(&config_path.to_path_buf())?;
        Output::info(&format!("Wrote current settings to {}", config_path.display()));
    }

    let editor = editor();
    Output::info(&format!("Opening {} in {}", config_path.display(), editor));

    let status = std::process::Command::new(&editor)
        .arg(config_path)
        .status()
        .with_context(|| format!("Could not launch editor '{}'", editor))?;
    if !status.success() {
        Output::warning(&format!("{} exited with {}", editor, status));
    }

    match Settings::load_from(Some(&config_path.to_path_buf())) {
        Ok(reloaded) => {
            Output::success("Settings are valid.");
            Output::kv("Staging root", &reloaded.temp_dir().display().to_string());
            Output::kv("Quality", &reloaded.transcode.quality.to_string());
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("{} no longer loads: {}", config_path.display(), e));
            Err(e.into())
        }
    }
}

/// `$VISUAL`, then `$EDITOR`, then `vi`.
fn editor() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}
