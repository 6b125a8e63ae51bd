use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use cal_api::{FdcClient, OffClient};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use cal_cli::commands::{self, lookup, search, session};
use cal_cli::devices::SimulatedCamera;
use cal_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn search_client(config: &Config) -> Result<FdcClient> {
    if config.uses_demo_key() {
        tracing::warn!("using the rate-limited demo API key; set CAL_API_KEY for regular use");
    }
    FdcClient::new(
        config.api_key.clone(),
        config.search_url.clone(),
        config.request_timeout(),
    )
    .context("failed to create food search client")
}

fn lookup_client(config: &Config) -> Result<OffClient> {
    OffClient::new(config.product_url.clone(), config.request_timeout())
        .context("failed to create product lookup client")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout();
    match &cli.command {
        Some(Commands::Search { query, json }) => {
            let config = load_config(cli.config.as_deref())?;
            let client = search_client(&config)?;
            search::run(&mut stdout, &client, &query.join(" "), *json).await?;
        }
        Some(Commands::Lookup { barcode, json }) => {
            let config = load_config(cli.config.as_deref())?;
            let client = lookup_client(&config)?;
            lookup::run(&mut stdout, &client, barcode, *json).await?;
        }
        Some(Commands::Session) => {
            let config = load_config(cli.config.as_deref())?;
            let mut repl = session::Repl::new(
                &config.session_config(),
                search_client(&config)?,
                lookup_client(&config)?,
                SimulatedCamera::new(&config.camera),
                stdout,
            );
            repl.run(BufReader::new(tokio::io::stdin())).await?;
            return Ok(());
        }
        Some(Commands::Config) => {
            let config = load_config(cli.config.as_deref())?;
            commands::config::run(&mut stdout, &config)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    stdout.flush()?;
    Ok(())
}
