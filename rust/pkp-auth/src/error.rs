//! Error taxonomy shared by the lifecycle manager and its collaborators.
//!
//! Collaborators report their decisions already tagged with a
//! [`LifecycleError`] variant, and the manager passes them through unchanged.

use crate::{AuthMethodRef, TokenId};
use thiserror::Error;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The signer, node network or registry could not be reached.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The presented credential's underlying auth method lacks the required
    /// permission on the identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The registry declined to mint a new identity.
    #[error("Mint rejected: {0}")]
    MintRejected(String),

    /// The requested scopes exceed what the registry allows.
    #[error("Scope rejected: {0}")]
    ScopeRejected(String),

    /// Revoking the method would leave the identity with no permitted auth
    /// method.
    #[error("Cannot revoke {method}: it is the last permitted auth method of {identity}")]
    LastMethodProtected {
        /// The identity whose last method was targeted.
        identity: TokenId,
        /// The auth method that would have been removed.
        method: AuthMethodRef,
    },

    /// An authentication proof or credential request was malformed, expired
    /// or did not verify.
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// A confirmed mutation is not yet observable through reads.
    #[error("Unconfirmed: {0}")]
    Unconfirmed(String),
}

impl LifecycleError {
    /// Whether repeating the same call unchanged may succeed.
    ///
    /// Only transport failures and not-yet-observable confirmations are
    /// retryable; everything else needs a different request or different
    /// authorization.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::ProviderUnavailable(_) | LifecycleError::Unconfirmed(_)
        )
    }
}

impl From<serde_json::Error> for LifecycleError {
    fn from(value: serde_json::Error) -> Self {
        LifecycleError::InvalidProof(value.to_string())
    }
}

impl From<pkp_credentials::SignError> for LifecycleError {
    fn from(value: pkp_credentials::SignError) -> Self {
        match value {
            pkp_credentials::SignError::KeyUnavailable(reason) => {
                LifecycleError::ProviderUnavailable(reason)
            }
            pkp_credentials::SignError::SigningFailed(reason) => {
                LifecycleError::InvalidProof(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_only_retries_transient_failures() {
        assert!(LifecycleError::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(LifecycleError::Unconfirmed("pending".into()).is_retryable());

        assert!(!LifecycleError::Unauthorized("revoked".into()).is_retryable());
        assert!(!LifecycleError::MintRejected("insufficient funds".into()).is_retryable());
        assert!(!LifecycleError::ScopeRejected("no-permissions".into()).is_retryable());
        assert!(!LifecycleError::InvalidProof("bad signature".into()).is_retryable());
    }
}
