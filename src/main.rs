use anyhow::Result;
use clap::Parser;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();
    logging::init(default_level(parsed.verbose));

    parsed.dispatch().await
}

fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}
