//! Principal and Authority traits for identity and signing.
//!
//! A [`Principal`] is anything with a DID: the node network that issues
//! session credentials, or a wallet that signs in. An [`Authority`] can also
//! sign on behalf of that DID.

use crate::Did;
use async_trait::async_trait;
use pkp_common::ConditionalSync;

/// A principal with a DID identity.
pub trait Principal {
    /// Get this principal's DID.
    fn did(&self) -> Did;
}

/// Error that can occur during signing operations.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// The signing key is not available or cannot be used.
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(String),

    /// An error occurred during the signing operation.
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// An authority that can sign data.
///
/// Extends `Principal` with the ability to sign payloads. Signing is async so
/// that keys held outside the process (hardware wallets, browser key stores)
/// fit the same trait.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Authority: Principal + ConditionalSync {
    /// Sign the given payload, returning the raw signature bytes.
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SignError>;
}
