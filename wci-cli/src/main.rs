//! WCI CLI - score watershed units and inspect persisted results.

use clap::Parser;
use std::path::PathBuf;
use wci_cmd::config::Settings;

#[derive(Parser)]
#[command(
    name = "wci-cli",
    version,
    about = "Watershed composite index engine"
)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long, env = "WCI_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: wci_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    wci_cmd::run(cli.command, &settings).await
}
