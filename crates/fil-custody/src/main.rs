//! fil-custody: custodial signing for Filecoin native and FEVM transactions

use clap::Parser;
use eyre::{eyre, WrapErr};

use fil_custody_adapters::CustodyConfig;

mod bridge;
mod cli;

use bridge::{command_key, CustodyBridge};
use cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = CustodyConfig::from_env().wrap_err("configuration")?;
    if let Some(network) = &cli.network {
        config.network = network
            .parse()
            .wrap_err_with(|| format!("network {network:?}"))?;
    }
    if let Some(mode) = &cli.mode {
        config.custody_mode = mode.parse().map_err(|e: String| eyre!(e))?;
    }

    tracing::info!(
        network = ?config.network,
        mode = ?config.custody_mode,
        lotus = %config.lotus_rpc_url,
        "Starting fil-custody"
    );

    let bridge =
        CustodyBridge::new(&config, cli.local_secret.as_deref(), &command_key(&cli.command)).await?;
    bridge.run(cli.command).await
}
