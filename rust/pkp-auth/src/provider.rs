//! The identity/session provider collaborator.

use crate::{
    AuthMethodAssertion, AuthMethodType, CapabilityRequest, LifecycleError, Proof,
    SessionCredential, TokenId,
};
use async_trait::async_trait;
use pkp_common::{ConditionalSync, time::SystemTime};

/// Verifies authentication proofs and issues session credentials.
///
/// A provider only attests that a proof satisfies an auth method. Whether
/// that method is permitted on an identity is decided by the
/// [`PermissionRegistry`](crate::PermissionRegistry) when the credential is
/// presented.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait SessionProvider: ConditionalSync {
    /// Check `proof` against an auth method of kind `kind`.
    ///
    /// Fails with [`LifecycleError::InvalidProof`] when the proof is of
    /// another kind, malformed, expired or does not verify.
    async fn authenticate(
        &self,
        kind: AuthMethodType,
        proof: &Proof,
    ) -> Result<AuthMethodAssertion, LifecycleError>;

    /// Issue a credential acting for `identity`, derived from `assertion`,
    /// covering `capabilities` until `expiration`.
    async fn issue_session_credential(
        &self,
        identity: &TokenId,
        assertion: &AuthMethodAssertion,
        capabilities: &[CapabilityRequest],
        expiration: SystemTime,
    ) -> Result<SessionCredential, LifecycleError>;
}
