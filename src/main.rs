use std::sync::Arc;

use snip20_history::{
    api, config,
    rpc::LcdClientFactory,
    session::Controller,
    wallet::{KeyringWallet, Wallet},
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("SNIP-20 history service starting...");

    // Load configuration
    let cfg = config::load()?;
    for network in &cfg.networks {
        info!(
            "  Network: {} ({}) via {} with {} known tokens",
            network.name,
            network.chain_id,
            network.lcd,
            network.tokens.len()
        );
    }

    // one HTTP pool for LCD queries and consensus key lookups
    let http = reqwest::Client::new();

    let wallet: Option<Arc<dyn Wallet>> = match &cfg.wallet_file {
        Some(path) => Some(Arc::new(KeyringWallet::load(path, &cfg.networks, http.clone())?)),
        None => {
            warn!("WALLET_FILE not set; connect and submit will report the wallet as unavailable");
            None
        }
    };

    let controller = Arc::new(Controller::new(
        cfg.networks.clone(),
        wallet,
        Arc::new(LcdClientFactory::new(http)),
    )?);

    // Graceful shutdown
    tokio::select! {
        res = api::serve(&cfg, controller) => match res {
            Ok(_) => info!("API exited cleanly"),
            Err(e) => error!("API error: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("SNIP-20 history service stopped.");
    Ok(())
}
