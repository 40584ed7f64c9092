mod config;
mod context;
mod diag;
mod docker;
mod error;
mod log;
mod pipeline;
mod preflight;
mod process;
mod remote;
mod stages;

use clap::Parser;
use error::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "omnibak", version, about = "Multi-source backup orchestrator")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log the versions of the external tools before running
    #[arg(long)]
    print_env: bool,
}

#[tokio::main]
async fn main() {
    log::init();

    let cli = Cli::parse();
    info!("OmniBak starting...");

    match run(&cli).await {
        Ok(_) => {
            info!("Backup run completed");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = config::load_from(&cli.config)?;
    if cli.print_env {
        diag::dump_environment().await;
    }
    pipeline::run(config).await
}
