use anyhow::Result;
use clap::Parser;
use ferrecontrol::cli::Cli;
use ferrecontrol::logging::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    cli.run().await
}
