//! Volatile in-memory node network and permission registry.
//!
//! Nothing here is persisted; state is lost when the values are dropped.
//!
//! # Trust
//!
//! The network signs two things with its node key: the access token of every
//! [`AuthMethodAssertion`] it hands out, and every session credential. The
//! registry is constructed with the network's verifier and accepts mints
//! only for assertions carrying a valid access token, and mutations only
//! for credentials signed by the network.
//!
//! # Example
//!
//! ```
//! use pkp_auth::{Lifecycle, Settings};
//! use pkp_network::{VolatileNetwork, VolatileRegistry};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let network = VolatileNetwork::generate("localhost")?;
//! let registry = VolatileRegistry::new(*network.verifier());
//! let lifecycle = Lifecycle::new(network, registry, Settings::default());
//! # Ok(())
//! # }
//! ```

mod registry;
pub use registry::*;

mod session;
pub use session::*;

use pkp_auth::{AuthMethodAssertion, AuthMethodRef, LifecycleError};
use pkp_credentials::Ed25519Verifier;

/// The bytes the network signs to vouch for an authenticated method.
fn attestation(method: &AuthMethodRef) -> Result<Vec<u8>, LifecycleError> {
    let mut payload = b"pkp-attestation:".to_vec();
    payload.extend(serde_json::to_vec(method)?);
    Ok(payload)
}

/// Check that `assertion` was handed out by the network behind `network`.
fn verify_assertion(
    network: &Ed25519Verifier,
    assertion: &AuthMethodAssertion,
) -> Result<(), LifecycleError> {
    let signature = hex::decode(&assertion.access_token).map_err(|_| {
        LifecycleError::InvalidProof(format!(
            "malformed access token for {}",
            assertion.method
        ))
    })?;
    network
        .verify(&attestation(&assertion.method)?, &signature)
        .map_err(|_| {
            LifecycleError::InvalidProof(format!(
                "access token for {} was not issued by {network}",
                assertion.method
            ))
        })
}
