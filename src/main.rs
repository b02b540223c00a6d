use clap::Parser;
use cloud_billing_exporter::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command() {
        Command::Serve => cli::serve::run(&cli).await,
        Command::Check => cli::check::run(&cli).await,
    }
}
