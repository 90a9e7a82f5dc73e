pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "streamvault")]
#[command(about = "Archive captured streams to decentralized storage")]
pub struct Args {
    /// Path to the streamvault config directory (defaults to ~/.streamvault)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
