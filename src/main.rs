//! toolrelay CLI binary entry point.

use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use toolrelay::cli::Cli;
use toolrelay::client::RelayClient;
use toolrelay::config::RelayConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let query = cli.query.clone();
    let config = cli.into_config(RelayConfig::from_env()?)?;
    let client = RelayClient::gemini(config)?;

    let mut stdout = std::io::stdout();
    writeln!(stdout, "User Query: '{query}'")?;
    client
        .run(&query, |fragment| {
            write!(stdout, "{fragment}")?;
            stdout.flush()?;
            Ok(())
        })
        .await?;
    writeln!(stdout)?;

    Ok(())
}
