//! Capability catalogue
//!
//! The closed set of actions the executor can offer to the model, with the
//! model-facing description and JSON input schema of each.

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use crate::llm::ToolDefinition;

/// Name of a capability, as the model sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CapabilityName {
    #[serde(rename = "getWalletDetails")]
    GetWalletDetails,
    #[serde(rename = "getBalance")]
    GetBalance,
    #[serde(rename = "requestFaucetFunds")]
    RequestFaucetFunds,
    #[serde(rename = "deployNFT")]
    DeployNft,
    #[serde(rename = "deployToken")]
    DeployToken,
    #[serde(rename = "mintNFT")]
    MintNft,
    #[serde(rename = "trade")]
    Trade,
    #[serde(rename = "transfer")]
    Transfer,
    #[serde(rename = "postTweet")]
    PostTweet,
}

impl CapabilityName {
    pub const ALL: [CapabilityName; 9] = [
        CapabilityName::GetWalletDetails,
        CapabilityName::GetBalance,
        CapabilityName::RequestFaucetFunds,
        CapabilityName::DeployNft,
        CapabilityName::DeployToken,
        CapabilityName::MintNft,
        CapabilityName::Trade,
        CapabilityName::Transfer,
        CapabilityName::PostTweet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityName::GetWalletDetails => "getWalletDetails",
            CapabilityName::GetBalance => "getBalance",
            CapabilityName::RequestFaucetFunds => "requestFaucetFunds",
            CapabilityName::DeployNft => "deployNFT",
            CapabilityName::DeployToken => "deployToken",
            CapabilityName::MintNft => "mintNFT",
            CapabilityName::Trade => "trade",
            CapabilityName::Transfer => "transfer",
            CapabilityName::PostTweet => "postTweet",
        }
    }

    /// Look up a capability by its wire name (exact match)
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Capabilities that need a social poster rather than the wallet
    pub fn is_social(&self) -> bool {
        matches!(self, CapabilityName::PostTweet)
    }

    pub fn description(&self) -> &'static str {
        match self {
            CapabilityName::GetWalletDetails => {
                "Get details about the connected wallet including network and address"
            }
            CapabilityName::GetBalance => "Get the balance of the wallet for a given asset",
            CapabilityName::RequestFaucetFunds => {
                "Request test tokens from the faucet for the default address in the wallet. \
                 If no asset ID is provided the faucet defaults to ETH. The faucet is only \
                 available on `base-sepolia` and can only provide asset ID `eth` or `usdc`. \
                 On any other network, suggest that the user sends some ETH from another \
                 wallet and share the wallet details."
            }
            CapabilityName::DeployNft => "Deploy a new NFT (ERC-721) collection with a name and description",
            CapabilityName::DeployToken => {
                "Deploy an ERC20 token smart contract. It takes the token name, symbol, and \
                 total supply as input. The wallet's default address becomes the owner and \
                 initial token holder."
            }
            CapabilityName::MintNft => {
                "Mint an NFT (ERC-721) to a destination address onchain. It takes the NFT \
                 contract address and the destination address as inputs. Do not use the \
                 contract address as the destination address."
            }
            CapabilityName::Trade => {
                "Trade an amount of a from asset to a to asset for the wallet. Trades are only \
                 supported on mainnets (e.g. `base-mainnet`, `ethereum-mainnet`). Never \
                 attempt trades on any other network."
            }
            CapabilityName::Transfer => {
                "Transfer an asset from the wallet to another onchain address, ENS name or \
                 Basename. The gasless option is available on `base-sepolia` and \
                 `base-mainnet` for `usdc` only; use it when available. Always make sure the \
                 wallet holds enough of the asset first."
            }
            CapabilityName::PostTweet => {
                "Post a tweet about an NFT deployment or other blockchain activity"
            }
        }
    }

    /// JSON schema for the capability's arguments
    pub fn input_schema(&self) -> Value {
        let (properties, required): (Value, Vec<&str>) = match self {
            CapabilityName::GetWalletDetails => (json!({}), vec![]),
            CapabilityName::GetBalance => (
                json!({
                    "assetId": {
                        "type": "string",
                        "description": "The asset ID to get the balance for, e.g. 'eth', 'usdc', or a contract address"
                    }
                }),
                vec!["assetId"],
            ),
            CapabilityName::RequestFaucetFunds => (
                json!({
                    "assetId": {
                        "type": "string",
                        "enum": ["eth", "usdc"],
                        "description": "Optional asset to request; defaults to eth"
                    }
                }),
                vec![],
            ),
            CapabilityName::DeployNft => (
                json!({
                    "name": {"type": "string", "description": "Collection name"},
                    "description": {"type": "string", "description": "Collection metadata description"}
                }),
                vec!["name", "description"],
            ),
            CapabilityName::DeployToken => (
                json!({
                    "name": {"type": "string", "description": "The name of the token, e.g. \"My Token\""},
                    "symbol": {"type": "string", "description": "The token symbol, e.g. \"MEME\""},
                    "totalSupply": {"type": "number", "description": "The total supply of tokens to mint"}
                }),
                vec!["name", "symbol", "totalSupply"],
            ),
            CapabilityName::MintNft => (
                json!({
                    "contractAddress": {"type": "string", "description": "The NFT contract address"},
                    "destination": {"type": "string", "description": "The address that receives the NFT"}
                }),
                vec!["contractAddress", "destination"],
            ),
            CapabilityName::Trade => (
                json!({
                    "amount": {"type": "number", "description": "Amount of the from asset to trade"},
                    "fromAssetId": {"type": "string", "description": "Asset to trade from, e.g. 'eth'"},
                    "toAssetId": {"type": "string", "description": "Asset to receive, e.g. 'usdc'"}
                }),
                vec!["amount", "fromAssetId", "toAssetId"],
            ),
            CapabilityName::Transfer => (
                json!({
                    "amount": {"type": "number", "description": "Amount of the asset to transfer"},
                    "assetId": {"type": "string", "description": "Asset to transfer, e.g. 'eth' or 'usdc'"},
                    "destination": {"type": "string", "description": "Onchain address, ENS name or Basename"},
                    "gasless": {"type": "boolean", "description": "Use a gasless transfer (usdc on base networks only)"}
                }),
                vec!["amount", "assetId", "destination"],
            ),
            CapabilityName::PostTweet => (
                json!({
                    "message": {"type": "string", "description": "The tweet text"},
                    "mediaUrl": {"type": "string", "description": "Optional URL of media to attach"}
                }),
                vec!["message"],
            ),
        };

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.as_str(), self.description(), self.input_schema())
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static descriptor, as listed to users and fed into prompts
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDescriptor {
    pub name: CapabilityName,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl From<CapabilityName> for CapabilityDescriptor {
    fn from(name: CapabilityName) -> Self {
        Self {
            name,
            description: name.description(),
            input_schema: name.input_schema(),
        }
    }
}
