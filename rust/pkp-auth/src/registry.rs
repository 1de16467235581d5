//! The permission registry collaborator.
//!
//! The registry is the source of truth for which auth methods may act for an
//! identity. It enforces authorization on every mutation and resolves a
//! mutation only once it is confirmed, so a successful call is observable by
//! the reads that follow it.

use crate::{
    AuthMethodAssertion, AuthMethodRecord, AuthMethodRef, Identity, LifecycleError, Owner, Scopes,
    SessionCredential, TokenId,
};
use async_trait::async_trait;
use pkp_common::{ConditionalSync, Sha256Hash};
use serde::{Deserialize, Serialize};

/// Whether a confirmed mutation changed registry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Change {
    /// State changed.
    Applied,
    /// The registry already held the requested state.
    Unchanged,
}

/// Acknowledgment of a confirmed registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash.
    pub transaction: Sha256Hash,
    /// Block in which the transaction was confirmed.
    pub block: u64,
    /// Whether the transaction changed anything.
    pub change: Change,
}

impl Receipt {
    /// Whether the mutation changed registry state.
    pub fn is_applied(&self) -> bool {
        self.change == Change::Applied
    }
}

/// Store of permitted auth methods per identity.
///
/// Implementations return their decisions already tagged with a
/// [`LifecycleError`] variant. Failed mutations must leave state unchanged.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait PermissionRegistry: ConditionalSync {
    /// Mint a new identity owned by the asserted method's controller and
    /// permit that method with `scopes`.
    async fn mint(
        &self,
        assertion: &AuthMethodAssertion,
        scopes: &Scopes,
    ) -> Result<Identity, LifecycleError>;

    /// Permit `method` on `identity` with `scopes`, authorized by
    /// `credential`.
    async fn grant(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
        scopes: &Scopes,
        credential: &SessionCredential,
    ) -> Result<Receipt, LifecycleError>;

    /// Remove `method` from `identity`, authorized by `credential`.
    async fn revoke(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
        credential: &SessionCredential,
    ) -> Result<Receipt, LifecycleError>;

    /// Whether `method` is currently permitted on `identity`. Unknown
    /// identities have no permitted methods.
    async fn is_permitted(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
    ) -> Result<bool, LifecycleError>;

    /// Every permitted method of `identity` with its scopes.
    async fn list_permitted(
        &self,
        identity: &TokenId,
    ) -> Result<Vec<AuthMethodRecord>, LifecycleError>;

    /// Current owner of `identity`, if it exists.
    async fn owner_of(&self, identity: &TokenId) -> Result<Option<Owner>, LifecycleError>;

    /// Hand ownership of `identity` to `owner`, authorized by `credential`.
    async fn transfer(
        &self,
        identity: &TokenId,
        owner: Owner,
        credential: &SessionCredential,
    ) -> Result<Receipt, LifecycleError>;

    /// Every identity on which `method` is currently permitted.
    async fn identities_for(&self, method: &AuthMethodRef)
    -> Result<Vec<TokenId>, LifecycleError>;
}
