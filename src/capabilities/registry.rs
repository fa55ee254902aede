//! Capability registry and dispatch
//!
//! Maps model-chosen names onto the closed `CapabilityName` set, validates
//! arguments against the declared schema, decodes them into a
//! `CapabilityCall` and runs it against the injected collaborators.

use log::{debug, warn};

use super::call::CapabilityCall;
use super::catalog::{CapabilityDescriptor, CapabilityName};
use super::{CapabilityContext, CapabilityError};
use crate::llm::{ToolCall, ToolDefinition, validate_tool_input};

/// The capabilities available for one run
pub struct CapabilityRegistry {
    enabled: Vec<CapabilityName>,
    definitions: Vec<ToolDefinition>,
    context: CapabilityContext,
}

impl CapabilityRegistry {
    /// Register every capability the context can serve
    pub fn new(context: CapabilityContext) -> Self {
        let enabled: Vec<CapabilityName> = CapabilityName::ALL
            .into_iter()
            .filter(|c| !c.is_social() || context.social.is_some())
            .collect();
        let definitions = enabled.iter().map(|c| c.definition()).collect();

        Self {
            enabled,
            definitions,
            context,
        }
    }

    /// Tool definitions offered to the model
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn names(&self) -> &[CapabilityName] {
        &self.enabled
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.enabled.iter().copied().map(CapabilityDescriptor::from).collect()
    }

    pub fn context(&self) -> &CapabilityContext {
        &self.context
    }

    /// One `- name: description` line per capability, for prompts
    pub fn catalogue_text(&self) -> String {
        self.enabled
            .iter()
            .map(|c| format!("- {}: {}", c.as_str(), c.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Look up, validate and decode a model tool call
    pub fn resolve(&self, call: &ToolCall) -> Result<CapabilityCall, CapabilityError> {
        let name = CapabilityName::parse(&call.name)
            .filter(|n| self.enabled.contains(n))
            .ok_or_else(|| CapabilityError::UnknownCapability(call.name.clone()))?;

        let position = self
            .enabled
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| CapabilityError::UnknownCapability(call.name.clone()))?;

        validate_tool_input(call, &self.definitions[position])?;
        Ok(CapabilityCall::decode(name, &call.input)?)
    }

    /// Run a typed call and render its result text
    pub async fn invoke(&self, call: CapabilityCall) -> Result<String, CapabilityError> {
        let wallet = &self.context.wallet;

        let text = match call {
            CapabilityCall::GetWalletDetails => {
                let d = wallet.details();
                format!("Wallet ID: {}, Network: {}, Address: {}", d.id, d.network, d.address)
            }
            CapabilityCall::GetBalance(input) => {
                let balance = wallet.balance(&input.asset_id).await?;
                format!("Balance for asset {}: {}", input.asset_id, balance)
            }
            CapabilityCall::RequestFaucetFunds(input) => {
                let tx = wallet.request_faucet(input.asset_id.as_deref()).await?;
                format!(
                    "Received {} from the faucet. Transaction hash: {}",
                    input.asset_id.as_deref().unwrap_or("ETH"),
                    tx
                )
            }
            CapabilityCall::DeployNft(input) => {
                let deployment = wallet.deploy_nft(&input.name, &input.description).await?;
                format!(
                    "NFT deployed successfully. Contract address: {}. Transaction hash: {}",
                    deployment.contract_address, deployment.tx_hash
                )
            }
            CapabilityCall::DeployToken(input) => {
                let deployment = wallet
                    .deploy_token(&input.name, &input.symbol, input.total_supply)
                    .await?;
                format!(
                    "Token {} ({}) deployed successfully with total supply of {} tokens. \
                     Contract address: {}. Transaction hash: {}",
                    input.name, input.symbol, input.total_supply, deployment.contract_address, deployment.tx_hash
                )
            }
            CapabilityCall::MintNft(input) => {
                let tx = wallet.mint_nft(&input.contract_address, &input.destination).await?;
                format!(
                    "Minted NFT from contract {} to address {}. Transaction hash: {}",
                    input.contract_address, input.destination, tx
                )
            }
            CapabilityCall::Trade(input) => {
                let tx = wallet
                    .trade(input.amount, &input.from_asset_id, &input.to_asset_id)
                    .await?;
                format!(
                    "Traded {} of {} for {}. Transaction hash: {}",
                    input.amount, input.from_asset_id, input.to_asset_id, tx
                )
            }
            CapabilityCall::Transfer(input) => {
                let tx = wallet
                    .transfer(input.amount, &input.asset_id, &input.destination, input.is_gasless())
                    .await?;
                format!(
                    "Transferred {} of {} to {}. Transaction hash: {}",
                    input.amount, input.asset_id, input.destination, tx
                )
            }
            CapabilityCall::PostTweet(input) => {
                let poster = self
                    .context
                    .social
                    .as_ref()
                    .ok_or_else(|| CapabilityError::UnknownCapability(CapabilityName::PostTweet.to_string()))?;
                let id = poster.post(&input.message, input.media_url.as_deref()).await?;
                format!("Tweet posted successfully. Tweet ID: {}", id)
            }
        };

        Ok(text)
    }

    /// Resolve and invoke a model tool call
    pub async fn dispatch(&self, call: &ToolCall) -> Result<String, CapabilityError> {
        let typed = self.resolve(call).inspect_err(|e| warn!("Rejected tool call {}: {}", call.name, e))?;
        debug!("Invoking capability {}", typed.name());
        self.invoke(typed).await
    }
}
