use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    talkcorpus::logging::init().context("init logging")?;

    let cli = talkcorpus::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        talkcorpus::cli::Command::Crawl(args) => {
            talkcorpus::crawl::run(args).await.context("crawl")?;
        }
        talkcorpus::cli::Command::Discover(args) => {
            talkcorpus::crawl::discover(args).await.context("discover")?;
        }
        talkcorpus::cli::Command::Extract(args) => {
            talkcorpus::crawl::extract(args).await.context("extract")?;
        }
        talkcorpus::cli::Command::Languages(args) => {
            talkcorpus::languages::run(args).await.context("languages")?;
        }
    }

    Ok(())
}
