//! CLI command implementations.

mod config;
mod doctor;
mod download;
mod search;
mod serve;

pub use config::run_config;
pub use doctor::run_doctor;
pub use download::run_download;
pub use search::run_search;
pub use serve::run_serve;
