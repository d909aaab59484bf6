//! CLI module for songdl.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// songdl - search and download audio as MP3
///
/// Searches a media platform by free text and fetches an audio-only MP3 of
/// the chosen result.
#[derive(Parser, Debug)]
#[command(name = "songdl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Search for tracks
    Search {
        /// Search query
        query: String,

        /// Maximum number of results (default from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Download one or more tracks as MP3
    Download {
        /// URLs, or search queries whose chosen result is downloaded
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Directory to write MP3 files into
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Which search result to download for query inputs (1-based)
        #[arg(short, long, default_value = "1")]
        pick: usize,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (default from config)
        #[arg(long, env = "SONGDL_HOST")]
        host: Option<String>,

        /// Port to bind to (default from config)
        #[arg(short, long, env = "SONGDL_PORT")]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

/// Whether a CLI input should be treated as a URL rather than a search query.
pub fn is_url_input(input: &str) -> bool {
    let input = input.trim();
    input.starts_with("http://") || input.starts_with("https://")
}
