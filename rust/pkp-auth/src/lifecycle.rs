//! The authorization lifecycle manager.
//!
//! [`Lifecycle`] sequences calls against a [`SessionProvider`] and a
//! [`PermissionRegistry`]: mint an identity bound to an initial auth method,
//! grant further methods, check permissions and revoke methods. It holds no
//! permission state of its own; every answer comes from the registry and
//! every registry decision is returned to the caller unchanged.

use crate::{
    AuthMethodAssertion, AuthMethodRecord, AuthMethodRef, AuthMethodType, ContentAddressing,
    Identity, LifecycleError, Owner, PermissionRegistry, Proof, RawSha256, Receipt, Scopes,
    SessionCredential, SessionProvider, Settings, TokenId,
};
use pkp_common::time::now;
use tracing::{debug, info, instrument, warn};

/// Outcome of a successful grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// The registry confirmed a new or changed record.
    Granted {
        /// The record now held by the registry.
        record: AuthMethodRecord,
        /// Receipt of the confirmed mutation.
        receipt: Receipt,
    },
    /// The method was already permitted with the same scopes; nothing
    /// changed.
    AlreadyPermitted {
        /// The record held by the registry.
        record: AuthMethodRecord,
    },
}

impl Grant {
    /// The record held by the registry after the grant.
    pub fn record(&self) -> &AuthMethodRecord {
        match self {
            Grant::Granted { record, .. } | Grant::AlreadyPermitted { record } => record,
        }
    }

    /// Whether the grant changed registry state.
    pub fn is_new(&self) -> bool {
        matches!(self, Grant::Granted { .. })
    }
}

/// Outcome of [`Lifecycle::replace_auth_method`].
#[derive(Debug, Clone)]
pub struct Replacement {
    /// The successor's grant.
    pub grant: Grant,
    /// Receipt of the bootstrap method's revocation.
    pub revoked: Receipt,
    /// A fresh credential derived from the successor, for the steps that
    /// follow.
    pub credential: SessionCredential,
}

/// Orchestrates the auth method lifecycle of identities.
///
/// Which method authorizes which step is always an explicit argument: the
/// caller threads identities and credentials from one call into the next.
#[derive(Debug, Clone)]
pub struct Lifecycle<P, R, C = RawSha256> {
    provider: P,
    registry: R,
    addressing: C,
    settings: Settings,
}

impl<P, R> Lifecycle<P, R>
where
    P: SessionProvider,
    R: PermissionRegistry,
{
    /// Create a manager that addresses actions with [`RawSha256`].
    pub fn new(provider: P, registry: R, settings: Settings) -> Self {
        Self {
            provider,
            registry,
            addressing: RawSha256,
            settings,
        }
    }
}

impl<P, R, C> Lifecycle<P, R, C>
where
    P: SessionProvider,
    R: PermissionRegistry,
    C: ContentAddressing,
{
    /// Replace the content addressing service.
    pub fn with_addressing<A: ContentAddressing>(self, addressing: A) -> Lifecycle<P, R, A> {
        Lifecycle {
            provider: self.provider,
            registry: self.registry,
            addressing,
            settings: self.settings,
        }
    }

    /// The active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The session provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The permission registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Check `proof` against an auth method of kind `kind`.
    pub async fn authenticate(
        &self,
        kind: AuthMethodType,
        proof: &Proof,
    ) -> Result<AuthMethodAssertion, LifecycleError> {
        let assertion = self.provider.authenticate(kind, proof).await?;
        debug!(method = %assertion.method, "Authenticated");
        Ok(assertion)
    }

    /// Mint a new identity bound to `initial` with the sign-anything scope,
    /// so the initial method can always authorize the grants that follow.
    #[instrument(skip_all, fields(method = %initial.method))]
    pub async fn mint(&self, initial: &AuthMethodAssertion) -> Result<Identity, LifecycleError> {
        let identity = self
            .registry
            .mint(initial, &Scopes::sign_anything())
            .await?;
        info!(token_id = %identity.token_id(), "Minted identity");
        Ok(identity)
    }

    /// Issue a session credential for `identity` derived from `assertion`,
    /// carrying the configured capabilities for one session lifetime.
    pub async fn session(
        &self,
        identity: &TokenId,
        assertion: &AuthMethodAssertion,
    ) -> Result<SessionCredential, LifecycleError> {
        let expiration = now()
            .checked_add(self.settings.session_ttl())
            .ok_or_else(|| {
                LifecycleError::InvalidProof(format!(
                    "session lifetime of {} seconds is out of range",
                    self.settings.session_ttl_seconds
                ))
            })?;
        self.provider
            .issue_session_credential(identity, assertion, &self.settings.capabilities, expiration)
            .await
    }

    /// Permit `method` on `identity` with `scopes`, authorized by a
    /// credential derived from a currently permitted method.
    ///
    /// Granting a method that is already permitted with the same scopes
    /// reports [`Grant::AlreadyPermitted`]. Granting it with other scopes
    /// replaces them.
    #[instrument(skip_all, fields(token_id = %identity, method = %method))]
    pub async fn grant_auth_method(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
        scopes: &Scopes,
        credential: &SessionCredential,
    ) -> Result<Grant, LifecycleError> {
        Self::precheck(identity, credential)?;

        let receipt = self
            .registry
            .grant(identity, method, scopes, credential)
            .await?;
        let record = AuthMethodRecord {
            method: method.clone(),
            scopes: scopes.clone(),
        };

        if receipt.is_applied() {
            info!(%scopes, block = receipt.block, "Granted auth method");
            Ok(Grant::Granted { record, receipt })
        } else {
            debug!("Auth method already permitted");
            Ok(Grant::AlreadyPermitted { record })
        }
    }

    /// Whether `method` is currently permitted on `identity`.
    pub async fn check_permission(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
    ) -> Result<bool, LifecycleError> {
        self.registry.is_permitted(identity, method).await
    }

    /// Every permitted method of `identity` with its scopes.
    pub async fn permitted_methods(
        &self,
        identity: &TokenId,
    ) -> Result<Vec<AuthMethodRecord>, LifecycleError> {
        self.registry.list_permitted(identity).await
    }

    /// Scopes granted to `method` on `identity`; empty when it is not
    /// permitted.
    pub async fn scopes_of(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
    ) -> Result<Scopes, LifecycleError> {
        Ok(self
            .registry
            .list_permitted(identity)
            .await?
            .into_iter()
            .find(|record| &record.method == method)
            .map(|record| record.scopes)
            .unwrap_or_default())
    }

    /// Remove `method` from `identity`, authorized by `credential`.
    ///
    /// The registry refuses to remove the last permitted method; that refusal
    /// is returned as [`LifecycleError::LastMethodProtected`].
    #[instrument(skip_all, fields(token_id = %identity, method = %method))]
    pub async fn revoke_auth_method(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
        credential: &SessionCredential,
    ) -> Result<Receipt, LifecycleError> {
        Self::precheck(identity, credential)?;

        let receipt = self
            .registry
            .revoke(identity, method, credential)
            .await
            .inspect_err(|error| warn!(%error, "Revocation refused"))?;
        info!(block = receipt.block, "Revoked auth method");
        Ok(receipt)
    }

    /// Make `identity` its own owner. Transferring an identity that already
    /// owns itself changes nothing.
    #[instrument(skip_all, fields(token_id = %identity.token_id()))]
    pub async fn transfer_to_self(
        &self,
        identity: &Identity,
        credential: &SessionCredential,
    ) -> Result<Identity, LifecycleError> {
        let token_id = identity.token_id();
        Self::precheck(token_id, credential)?;

        let receipt = self
            .registry
            .transfer(token_id, Owner::Itself, credential)
            .await?;
        let owner = self.registry.owner_of(token_id).await?.ok_or_else(|| {
            LifecycleError::Unconfirmed(format!("{token_id} is not visible after transfer"))
        })?;
        info!(block = receipt.block, ?owner, "Transferred identity");

        Ok(identity.clone().with_owner(owner))
    }

    /// Every identity on which `method` is currently permitted.
    pub async fn identities_for(
        &self,
        method: &AuthMethodRef,
    ) -> Result<Vec<TokenId>, LifecycleError> {
        self.registry.identities_for(method).await
    }

    /// Reference of the action auth method whose source is `source`.
    pub fn action_method(&self, source: &str) -> AuthMethodRef {
        AuthMethodRef::action(&self.addressing.compute_reference(source.as_bytes()))
    }

    /// Address `source` and permit the resulting action method on
    /// `identity`.
    pub async fn register_action(
        &self,
        identity: &TokenId,
        source: &str,
        scopes: &Scopes,
        credential: &SessionCredential,
    ) -> Result<Grant, LifecycleError> {
        let method = self.action_method(source);
        self.grant_auth_method(identity, &method, scopes, credential)
            .await
    }

    /// Hand control of `identity` from the method behind `bootstrap` to
    /// `successor`.
    ///
    /// The successor is granted with the bootstrap credential, then verified
    /// as permitted, then used to obtain a fresh credential that revokes the
    /// bootstrap method. If the successor cannot be observed as permitted
    /// nothing is revoked and [`LifecycleError::Unconfirmed`] is returned.
    /// `scopes` must include `sign-anything` for the successor to be able to
    /// authorize the revocation.
    #[instrument(
        skip_all,
        fields(token_id = %identity, from = %bootstrap.method(), to = %successor.method)
    )]
    pub async fn replace_auth_method(
        &self,
        identity: &TokenId,
        successor: &AuthMethodAssertion,
        scopes: &Scopes,
        bootstrap: &SessionCredential,
    ) -> Result<Replacement, LifecycleError> {
        if &successor.method == bootstrap.method() {
            return Err(LifecycleError::Unauthorized(format!(
                "{} cannot replace itself",
                successor.method
            )));
        }

        let grant = self
            .grant_auth_method(identity, &successor.method, scopes, bootstrap)
            .await?;

        if !self.check_permission(identity, &successor.method).await? {
            warn!("Successor not yet observable; keeping bootstrap method");
            return Err(LifecycleError::Unconfirmed(format!(
                "{} is not yet permitted on {identity}",
                successor.method
            )));
        }

        let credential = self.session(identity, successor).await?;
        let revoked = self
            .revoke_auth_method(identity, bootstrap.method(), &credential)
            .await?;

        Ok(Replacement {
            grant,
            revoked,
            credential,
        })
    }

    fn precheck(identity: &TokenId, credential: &SessionCredential) -> Result<(), LifecycleError> {
        if credential.identity() != identity {
            return Err(LifecycleError::Unauthorized(format!(
                "credential acts for {} not {identity}",
                credential.identity()
            )));
        }
        if credential.is_expired_at(now()) {
            return Err(LifecycleError::Unauthorized(format!(
                "credential from {} has expired",
                credential.method()
            )));
        }
        Ok(())
    }
}
