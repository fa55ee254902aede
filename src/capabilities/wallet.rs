//! Wallet collaborator
//!
//! The loop never touches chain mechanics directly; it talks to a `Wallet`.
//! `SimulatedWallet` is an in-process ledger that enforces the same
//! preconditions a hosted wallet would (network, asset, balance) and returns
//! deterministic transaction hashes.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, info};
use serde::Serialize;

use super::CapabilityError;
use crate::id::{generate_wallet_id, hex_digest};

/// Network where the faucet is available
pub const FAUCET_NETWORK: &str = "base-sepolia";

/// Networks where gasless usdc transfers are available
pub const GASLESS_NETWORKS: [&str; 2] = ["base-sepolia", "base-mainnet"];

const FAUCET_ETH: f64 = 0.0001;
const FAUCET_USDC: f64 = 1.0;

/// Identity of a provisioned wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletDetails {
    pub id: String,
    pub network: String,
    pub address: String,
}

/// A deployed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract_address: String,
    pub tx_hash: String,
}

/// Wallet operations offered to capabilities
#[async_trait]
pub trait Wallet: Send + Sync {
    fn details(&self) -> WalletDetails;

    async fn balance(&self, asset_id: &str) -> Result<f64, CapabilityError>;

    /// Request testnet funds; `None` means the native asset
    async fn request_faucet(&self, asset_id: Option<&str>) -> Result<String, CapabilityError>;

    async fn deploy_nft(&self, name: &str, description: &str) -> Result<Deployment, CapabilityError>;

    async fn deploy_token(&self, name: &str, symbol: &str, total_supply: f64) -> Result<Deployment, CapabilityError>;

    async fn mint_nft(&self, contract_address: &str, destination: &str) -> Result<String, CapabilityError>;

    async fn trade(&self, amount: f64, from_asset_id: &str, to_asset_id: &str) -> Result<String, CapabilityError>;

    async fn transfer(
        &self,
        amount: f64,
        asset_id: &str,
        destination: &str,
        gasless: bool,
    ) -> Result<String, CapabilityError>;
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<String, f64>,
    nonce: u64,
}

/// In-process wallet with a simulated ledger
#[derive(Debug)]
pub struct SimulatedWallet {
    id: String,
    network_id: String,
    address: String,
    ledger: Mutex<Ledger>,
}

impl SimulatedWallet {
    /// Create an empty wallet on `network_id`
    pub fn new(network_id: impl Into<String>) -> Self {
        let id = generate_wallet_id();
        let address = hex_digest(&[&id, "address"], 40);
        Self {
            id,
            network_id: network_id.into(),
            address,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Seed a balance, for tests and demos
    pub fn with_balance(self, asset_id: &str, amount: f64) -> Self {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.balances.insert(normalize(asset_id), amount);
        }
        self
    }

    fn is_mainnet(&self) -> bool {
        self.network_id.contains("mainnet")
    }

    fn ledger(&self) -> Result<std::sync::MutexGuard<'_, Ledger>, CapabilityError> {
        self.ledger
            .lock()
            .map_err(|_| CapabilityError::Backend("wallet ledger poisoned".to_string()))
    }

    /// Next deterministic hash for this wallet
    fn next_hash(&self, ledger: &mut Ledger, op: &str, len: usize) -> String {
        ledger.nonce += 1;
        hex_digest(&[&self.id, op, &ledger.nonce.to_string()], len)
    }
}

fn normalize(asset_id: &str) -> String {
    asset_id.trim().to_lowercase()
}

fn require_positive(what: &str, amount: f64) -> Result<(), CapabilityError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(CapabilityError::Precondition(format!("{} must be positive", what)))
    }
}

#[async_trait]
impl Wallet for SimulatedWallet {
    fn details(&self) -> WalletDetails {
        WalletDetails {
            id: self.id.clone(),
            network: self.network_id.clone(),
            address: self.address.clone(),
        }
    }

    async fn balance(&self, asset_id: &str) -> Result<f64, CapabilityError> {
        let ledger = self.ledger()?;
        Ok(ledger.balances.get(&normalize(asset_id)).copied().unwrap_or(0.0))
    }

    async fn request_faucet(&self, asset_id: Option<&str>) -> Result<String, CapabilityError> {
        if self.network_id != FAUCET_NETWORK {
            return Err(CapabilityError::Precondition(format!(
                "faucet is only available on {}, wallet is on {}",
                FAUCET_NETWORK, self.network_id
            )));
        }

        let asset = normalize(asset_id.unwrap_or("eth"));
        let amount = match asset.as_str() {
            "eth" => FAUCET_ETH,
            "usdc" => FAUCET_USDC,
            other => {
                return Err(CapabilityError::Precondition(format!(
                    "faucet only provides eth or usdc, not {}",
                    other
                )));
            }
        };

        let mut ledger = self.ledger()?;
        *ledger.balances.entry(asset.clone()).or_insert(0.0) += amount;
        let tx = self.next_hash(&mut ledger, "faucet", 64);
        info!("Faucet credited {} {} to {}", amount, asset, self.address);
        Ok(tx)
    }

    async fn deploy_nft(&self, name: &str, description: &str) -> Result<Deployment, CapabilityError> {
        let mut ledger = self.ledger()?;
        let contract_address = self.next_hash(&mut ledger, &format!("nft:{}", name), 40);
        let tx_hash = self.next_hash(&mut ledger, "deploy", 64);
        debug!("Deployed NFT {} ({}) at {}", name, description, contract_address);
        Ok(Deployment {
            contract_address,
            tx_hash,
        })
    }

    async fn deploy_token(&self, name: &str, symbol: &str, total_supply: f64) -> Result<Deployment, CapabilityError> {
        require_positive("totalSupply", total_supply)?;

        let mut ledger = self.ledger()?;
        let contract_address = self.next_hash(&mut ledger, &format!("token:{}:{}", name, symbol), 40);
        let tx_hash = self.next_hash(&mut ledger, "deploy", 64);
        // Owner holds the full supply, keyed by contract address
        ledger.balances.insert(normalize(&contract_address), total_supply);
        debug!("Deployed token {} ({}) at {}", name, symbol, contract_address);
        Ok(Deployment {
            contract_address,
            tx_hash,
        })
    }

    async fn mint_nft(&self, contract_address: &str, destination: &str) -> Result<String, CapabilityError> {
        if normalize(contract_address) == normalize(destination) {
            return Err(CapabilityError::Precondition(
                "destination must not be the contract address".to_string(),
            ));
        }

        let mut ledger = self.ledger()?;
        Ok(self.next_hash(&mut ledger, "mint", 64))
    }

    async fn trade(&self, amount: f64, from_asset_id: &str, to_asset_id: &str) -> Result<String, CapabilityError> {
        if !self.is_mainnet() {
            return Err(CapabilityError::Precondition(format!(
                "trades are only supported on mainnet networks, wallet is on {}",
                self.network_id
            )));
        }
        require_positive("amount", amount)?;

        let from = normalize(from_asset_id);
        let to = normalize(to_asset_id);
        let mut ledger = self.ledger()?;
        let held = ledger.balances.get(&from).copied().unwrap_or(0.0);
        if held < amount {
            return Err(CapabilityError::Precondition("insufficient balance".to_string()));
        }

        // Simulated quote: one unit in, one unit out
        ledger.balances.insert(from, held - amount);
        *ledger.balances.entry(to).or_insert(0.0) += amount;
        Ok(self.next_hash(&mut ledger, "trade", 64))
    }

    async fn transfer(
        &self,
        amount: f64,
        asset_id: &str,
        destination: &str,
        gasless: bool,
    ) -> Result<String, CapabilityError> {
        require_positive("amount", amount)?;

        let asset = normalize(asset_id);
        if gasless && !(asset == "usdc" && GASLESS_NETWORKS.contains(&self.network_id.as_str())) {
            return Err(CapabilityError::Precondition(
                "gasless transfers are only available for usdc on base-sepolia and base-mainnet".to_string(),
            ));
        }

        let mut ledger = self.ledger()?;
        let held = ledger.balances.get(&asset).copied().unwrap_or(0.0);
        if held < amount {
            return Err(CapabilityError::Precondition("insufficient balance".to_string()));
        }

        ledger.balances.insert(asset, held - amount);
        debug!("Transferred {} {} to {}", amount, asset_id, destination);
        Ok(self.next_hash(&mut ledger, "transfer", 64))
    }
}
