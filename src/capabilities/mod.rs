//! Capabilities - the actions the executor can take
//!
//! - catalog: closed set of capability names, descriptions and input schemas
//! - call: typed capability calls decoded from validated model arguments
//! - registry: lookup, validation and dispatch
//! - wallet / social: injected collaborators with simulated backends

use std::sync::Arc;

pub mod call;
pub mod catalog;
pub mod registry;
pub mod social;
pub mod wallet;

pub use call::CapabilityCall;
pub use catalog::{CapabilityDescriptor, CapabilityName};
pub use registry::CapabilityRegistry;
pub use social::{DryRunPoster, SocialPoster};
pub use wallet::{Deployment, SimulatedWallet, Wallet, WalletDetails};

use crate::llm::SchemaViolation;

/// Errors raised while resolving or executing a capability
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Model arguments don't match the declared schema
    #[error("invalid input for {0}")]
    Validation(#[from] SchemaViolation),

    /// Name is not in the registry
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// External precondition unmet (network, balance, asset)
    #[error("{0}")]
    Precondition(String),

    /// Collaborator failed
    #[error("{0}")]
    Backend(String),
}

/// Handles every capability call receives
#[derive(Clone)]
pub struct CapabilityContext {
    pub wallet: Arc<dyn Wallet>,
    pub social: Option<Arc<dyn SocialPoster>>,
}

impl std::fmt::Debug for CapabilityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityContext")
            .field("wallet", &self.wallet.details())
            .field("social", &self.social.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err: CapabilityError = SchemaViolation {
            tool: "transfer".to_string(),
            reason: "missing required field: destination".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid input for transfer: missing required field: destination"
        );
    }

    #[test]
    fn test_precondition_display_is_message() {
        let err = CapabilityError::Precondition("insufficient balance".to_string());
        assert_eq!(err.to_string(), "insufficient balance");
    }
}
