//! One-shot provisioning before the loop starts.
//!
//! Creates the wallet on the configured network, funds it from the faucet when
//! asked to, and assembles the `CapabilityContext` every capability call uses.

use std::sync::Arc;

use log::{info, warn};

use crate::capabilities::wallet::FAUCET_NETWORK;
use crate::capabilities::{CapabilityContext, DryRunPoster, SimulatedWallet, SocialPoster, Wallet};
use crate::config::Config;
use crate::error::Result;

/// Build the capability context for a run
pub async fn provision(config: &Config) -> Result<CapabilityContext> {
    let wallet: Arc<dyn Wallet> = Arc::new(SimulatedWallet::new(config.wallet.network_id.clone()));
    let details = wallet.details();
    info!(
        "Wallet {} provisioned on {} at {}",
        details.id, details.network, details.address
    );

    if config.wallet.bootstrap_faucet {
        fund_from_faucet(wallet.as_ref()).await;
    }

    let social: Option<Arc<dyn SocialPoster>> = if config.social.enabled {
        Some(Arc::new(DryRunPoster::new(config.social.handle.clone())))
    } else {
        info!("Social posting disabled");
        None
    };

    Ok(CapabilityContext { wallet, social })
}

async fn fund_from_faucet(wallet: &dyn Wallet) {
    let network = wallet.details().network;
    if network != FAUCET_NETWORK {
        info!("Skipping faucet funding: no faucet on {}", network);
        return;
    }
    match wallet.request_faucet(None).await {
        Ok(tx) => info!("Faucet funding confirmed: {}", tx),
        Err(e) => warn!("Faucet funding failed: {}", e),
    }
}
