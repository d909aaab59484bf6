//! songdl CLI entry point.

use anyhow::Result;
use clap::Parser;
use songdl::cli::{commands, Cli, Commands};
use songdl::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli
        .config
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("songdl={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Cookies are read once; the store is immutable afterwards.
    let cookies = songdl::cookies::init_from_env(&settings.cookies.env_var);

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Search { query, limit } => {
            commands::run_search(query, *limit, &settings, cookies).await?;
        }

        Commands::Download { inputs, output, pick } => {
            commands::run_download(inputs, output.clone(), *pick, &settings, cookies).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings, cookies).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &settings, config_path)?;
        }
    }

    Ok(())
}
