// CLI modules
mod args;
mod op;
mod ops;
mod state;
mod store;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Decrypt, History, Init, Upload, Version};
use tracing_subscriber::EnvFilter;

command_enum! {
    (Decrypt, Decrypt),
    (History, History),
    (Init, Init),
    (Upload, Upload),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let ctx = op::OpContext::new(args.config_path);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
