pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "teamchain")]
#[command(about = "Create end-to-end encrypted teams and subteams")]
#[command(version)]
pub struct Args {
    /// Team server URL (defaults to the config's api_url)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the teamchain config directory (defaults to ~/.teamchain)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `common=trace` (defaults to the
    /// config's log_level)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
