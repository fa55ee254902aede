//! Typed capability calls
//!
//! After schema validation, model arguments are decoded into one variant of
//! `CapabilityCall`. Dispatch matches on this enum, so every capability is
//! handled exhaustively.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::catalog::CapabilityName;
use crate::llm::SchemaViolation;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInput {
    pub asset_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetInput {
    #[serde(default)]
    pub asset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeployNftInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployTokenInput {
    pub name: String,
    pub symbol: String,
    pub total_supply: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintNftInput {
    pub contract_address: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeInput {
    pub amount: f64,
    pub from_asset_id: String,
    pub to_asset_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInput {
    pub amount: f64,
    pub asset_id: String,
    pub destination: String,
    #[serde(default)]
    pub gasless: Option<bool>,
}

impl TransferInput {
    pub fn is_gasless(&self) -> bool {
        self.gasless.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetInput {
    pub message: String,
    #[serde(default)]
    pub media_url: Option<String>,
}

/// A validated, typed capability invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityCall {
    GetWalletDetails,
    GetBalance(BalanceInput),
    RequestFaucetFunds(FaucetInput),
    DeployNft(DeployNftInput),
    DeployToken(DeployTokenInput),
    MintNft(MintNftInput),
    Trade(TradeInput),
    Transfer(TransferInput),
    PostTweet(TweetInput),
}

impl CapabilityCall {
    /// Decode schema-checked arguments into the variant for `name`
    pub fn decode(name: CapabilityName, input: &Value) -> Result<Self, SchemaViolation> {
        let call = match name {
            CapabilityName::GetWalletDetails => CapabilityCall::GetWalletDetails,
            CapabilityName::GetBalance => CapabilityCall::GetBalance(decode_input(name, input)?),
            CapabilityName::RequestFaucetFunds => CapabilityCall::RequestFaucetFunds(decode_input(name, input)?),
            CapabilityName::DeployNft => CapabilityCall::DeployNft(decode_input(name, input)?),
            CapabilityName::DeployToken => CapabilityCall::DeployToken(decode_input(name, input)?),
            CapabilityName::MintNft => CapabilityCall::MintNft(decode_input(name, input)?),
            CapabilityName::Trade => CapabilityCall::Trade(decode_input(name, input)?),
            CapabilityName::Transfer => CapabilityCall::Transfer(decode_input(name, input)?),
            CapabilityName::PostTweet => CapabilityCall::PostTweet(decode_input(name, input)?),
        };
        Ok(call)
    }

    pub fn name(&self) -> CapabilityName {
        match self {
            CapabilityCall::GetWalletDetails => CapabilityName::GetWalletDetails,
            CapabilityCall::GetBalance(_) => CapabilityName::GetBalance,
            CapabilityCall::RequestFaucetFunds(_) => CapabilityName::RequestFaucetFunds,
            CapabilityCall::DeployNft(_) => CapabilityName::DeployNft,
            CapabilityCall::DeployToken(_) => CapabilityName::DeployToken,
            CapabilityCall::MintNft(_) => CapabilityName::MintNft,
            CapabilityCall::Trade(_) => CapabilityName::Trade,
            CapabilityCall::Transfer(_) => CapabilityName::Transfer,
            CapabilityCall::PostTweet(_) => CapabilityName::PostTweet,
        }
    }
}

fn decode_input<T: DeserializeOwned>(name: CapabilityName, input: &Value) -> Result<T, SchemaViolation> {
    serde_json::from_value(input.clone()).map_err(|e| SchemaViolation {
        tool: name.as_str().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_transfer() {
        let call = CapabilityCall::decode(
            CapabilityName::Transfer,
            &json!({"amount": 5, "assetId": "usdc", "destination": "example.base.eth", "gasless": true}),
        )
        .unwrap();

        match call {
            CapabilityCall::Transfer(input) => {
                assert_eq!(input.amount, 5.0);
                assert_eq!(input.asset_id, "usdc");
                assert!(input.is_gasless());
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[test]
    fn test_decode_transfer_gasless_defaults_false() {
        let call = CapabilityCall::decode(
            CapabilityName::Transfer,
            &json!({"amount": 1, "assetId": "eth", "destination": "0xabc"}),
        )
        .unwrap();
        assert!(matches!(call, CapabilityCall::Transfer(ref t) if !t.is_gasless()));
    }

    #[test]
    fn test_decode_faucet_without_asset() {
        let call = CapabilityCall::decode(CapabilityName::RequestFaucetFunds, &json!({})).unwrap();
        assert_eq!(call, CapabilityCall::RequestFaucetFunds(FaucetInput { asset_id: None }));
    }

    #[test]
    fn test_decode_wallet_details_ignores_input() {
        let call = CapabilityCall::decode(CapabilityName::GetWalletDetails, &json!({})).unwrap();
        assert_eq!(call, CapabilityCall::GetWalletDetails);
    }

    #[test]
    fn test_decode_wrong_shape_reports_tool() {
        let err = CapabilityCall::decode(CapabilityName::DeployToken, &json!({"name": "X"})).unwrap_err();
        assert_eq!(err.tool, "deployToken");
        assert!(err.reason.contains("symbol"));
    }

    #[test]
    fn test_name_matches_variant() {
        for name in CapabilityName::ALL {
            let input = match name {
                CapabilityName::GetBalance => json!({"assetId": "eth"}),
                CapabilityName::DeployNft => json!({"name": "n", "description": "d"}),
                CapabilityName::DeployToken => json!({"name": "n", "symbol": "S", "totalSupply": 1}),
                CapabilityName::MintNft => json!({"contractAddress": "0x1", "destination": "0x2"}),
                CapabilityName::Trade => json!({"amount": 1, "fromAssetId": "eth", "toAssetId": "usdc"}),
                CapabilityName::Transfer => json!({"amount": 1, "assetId": "eth", "destination": "0x2"}),
                CapabilityName::PostTweet => json!({"message": "gm"}),
                CapabilityName::GetWalletDetails | CapabilityName::RequestFaucetFunds => json!({}),
            };
            assert_eq!(CapabilityCall::decode(name, &input).unwrap().name(), name);
        }
    }
}
