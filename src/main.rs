use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;
use digestify::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    match try_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> anyhow::Result<()> {
    digestify::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Scrape(args) => digestify::pipeline::run(args).await.context("scrape")?,
        Command::Parse(args) => digestify::parse::run(args).context("parse")?,
        Command::Import(args) => digestify::import::run(args).await.context("import")?,
    }
    Ok(())
}
