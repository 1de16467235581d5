//! Permission registry half of the volatile network.

use super::verify_assertion;
use async_trait::async_trait;
use pkp_auth::{
    Address, AuthMethodAssertion, AuthMethodRecord, AuthMethodRef, Change, Identity,
    LifecycleError, Owner, PermissionRegistry, PublicKey, Receipt, Scope, Scopes,
    SessionCredential, TokenId,
};
use pkp_common::{SharedCell, Sha256Hash, time::now};
use pkp_credentials::{Ed25519Signer, Ed25519Verifier};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

/// Registry state for one identity.
#[derive(Debug)]
struct Entry {
    identity: Identity,
    methods: BTreeMap<AuthMethodRef, Scopes>,
}

/// Everything the registry has confirmed so far.
#[derive(Debug, Default)]
struct Ledger {
    entries: BTreeMap<TokenId, Entry>,
    block: u64,
}

impl Ledger {
    /// Confirm a transaction in the next block.
    fn confirm(&mut self, operation: &str, identity: &TokenId, change: Change) -> Receipt {
        if change == Change::Applied {
            self.block += 1;
        }
        let block = self.block.to_be_bytes();
        let chunks: [&[u8]; 3] = [operation.as_bytes(), identity.as_bytes(), &block];
        Receipt {
            transaction: Sha256Hash::hash_iter(chunks.into_iter()),
            block: self.block,
            change,
        }
    }

    /// Check that `credential` may mutate `identity`.
    fn authorize(
        &self,
        network: &Ed25519Verifier,
        identity: &TokenId,
        credential: &SessionCredential,
    ) -> Result<(), LifecycleError> {
        credential.verify_issued_by(network)?;

        if credential.identity() != identity {
            return Err(LifecycleError::Unauthorized(format!(
                "credential acts for {} not {identity}",
                credential.identity()
            )));
        }
        if credential.is_expired_at(now()) {
            return Err(LifecycleError::Unauthorized("credential has expired".into()));
        }
        if !credential.grants_signing_for(identity) {
            return Err(LifecycleError::Unauthorized(format!(
                "credential does not carry pkp-signing for {identity}"
            )));
        }

        let entry = self
            .entries
            .get(identity)
            .ok_or_else(|| LifecycleError::Unauthorized(format!("{identity} does not exist")))?;
        match entry.methods.get(credential.method()) {
            Some(scopes) if scopes.contains(Scope::SignAnything) => Ok(()),
            Some(_) => Err(LifecycleError::Unauthorized(format!(
                "{} may not sign for {identity}",
                credential.method()
            ))),
            None => Err(LifecycleError::Unauthorized(format!(
                "{} is not permitted on {identity}",
                credential.method()
            ))),
        }
    }

    fn entry_mut(&mut self, identity: &TokenId) -> Result<&mut Entry, LifecycleError> {
        self.entries
            .get_mut(identity)
            .ok_or_else(|| LifecycleError::Unauthorized(format!("{identity} does not exist")))
    }
}

/// An in-memory permission registry.
///
/// Mutations are confirmed synchronously: a call that returns a receipt is
/// visible to every read that follows it. Each mutation checks
/// authorization and applies its change under one write guard, so concurrent
/// callers see either all or none of it.
#[derive(Debug)]
pub struct VolatileRegistry {
    network: Ed25519Verifier,
    account: Address,
    allowed: Scopes,
    online: AtomicBool,
    ledger: SharedCell<Ledger>,
}

impl VolatileRegistry {
    /// A registry trusting credentials signed by `network`.
    ///
    /// Minted identities are owned by an account derived from the network
    /// key until [`VolatileRegistry::with_account`] says otherwise. Every
    /// scope is allowed.
    pub fn new(network: Ed25519Verifier) -> Self {
        Self {
            account: Address::derive(&network.to_bytes()),
            network,
            allowed: Scopes::all(),
            online: AtomicBool::new(true),
            ledger: SharedCell::default(),
        }
    }

    /// Own minted identities with `account`.
    pub fn with_account(mut self, account: Address) -> Self {
        self.account = account;
        self
    }

    /// Restrict the scopes this registry grants.
    pub fn with_allowed_scopes(mut self, allowed: Scopes) -> Self {
        self.allowed = allowed;
        self
    }

    /// Simulate the registry becoming reachable or unreachable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of confirmed blocks.
    pub fn height(&self) -> u64 {
        self.ledger.read().block
    }

    fn ensure_online(&self) -> Result<(), LifecycleError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LifecycleError::ProviderUnavailable(
                "permission registry is unreachable".into(),
            ))
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl PermissionRegistry for VolatileRegistry {
    #[instrument(skip_all, fields(method = %assertion.method))]
    async fn mint(
        &self,
        assertion: &AuthMethodAssertion,
        scopes: &Scopes,
    ) -> Result<Identity, LifecycleError> {
        self.ensure_online()?;
        verify_assertion(&self.network, assertion)
            .map_err(|error| LifecycleError::MintRejected(error.to_string()))?;
        scopes
            .check(&self.allowed)
            .map_err(|violation| LifecycleError::MintRejected(violation.to_string()))?;

        let key = Ed25519Signer::generate()
            .map_err(|error| LifecycleError::ProviderUnavailable(error.to_string()))?;
        let identity = Identity::new(
            PublicKey::new(key.verifier().to_bytes()),
            Owner::Account(self.account),
        );

        let block = self.ledger.update(|ledger| {
            ledger.entries.insert(
                *identity.token_id(),
                Entry {
                    identity: identity.clone(),
                    methods: BTreeMap::from([(assertion.method.clone(), scopes.clone())]),
                },
            );
            ledger
                .confirm("mint", identity.token_id(), Change::Applied)
                .block
        });
        info!(token_id = %identity.token_id(), block, "Minted");

        Ok(identity)
    }

    #[instrument(skip_all, fields(token_id = %identity, method = %method))]
    async fn grant(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
        scopes: &Scopes,
        credential: &SessionCredential,
    ) -> Result<Receipt, LifecycleError> {
        self.ensure_online()?;

        self.ledger.update(|ledger| -> Result<Receipt, LifecycleError> {
            ledger.authorize(&self.network, identity, credential)?;
            scopes
                .check(&self.allowed)
                .map_err(|violation| LifecycleError::ScopeRejected(violation.to_string()))?;

            let entry = ledger.entry_mut(identity)?;
            let change = match entry.methods.insert(method.clone(), scopes.clone()) {
                Some(previous) if &previous == scopes => Change::Unchanged,
                _ => Change::Applied,
            };
            debug!(?change, %scopes, "Grant confirmed");

            Ok(ledger.confirm("grant", identity, change))
        })
    }

    #[instrument(skip_all, fields(token_id = %identity, method = %method))]
    async fn revoke(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
        credential: &SessionCredential,
    ) -> Result<Receipt, LifecycleError> {
        self.ensure_online()?;

        self.ledger.update(|ledger| -> Result<Receipt, LifecycleError> {
            ledger.authorize(&self.network, identity, credential)?;

            let entry = ledger.entry_mut(identity)?;
            let change = if !entry.methods.contains_key(method) {
                Change::Unchanged
            } else if entry.methods.len() == 1 {
                warn!("Refusing to revoke the last permitted auth method");
                return Err(LifecycleError::LastMethodProtected {
                    identity: *identity,
                    method: method.clone(),
                });
            } else {
                entry.methods.remove(method);
                Change::Applied
            };
            debug!(?change, "Revoke confirmed");

            Ok(ledger.confirm("revoke", identity, change))
        })
    }

    async fn is_permitted(
        &self,
        identity: &TokenId,
        method: &AuthMethodRef,
    ) -> Result<bool, LifecycleError> {
        self.ensure_online()?;
        Ok(self
            .ledger
            .read()
            .entries
            .get(identity)
            .is_some_and(|entry| entry.methods.contains_key(method)))
    }

    async fn list_permitted(
        &self,
        identity: &TokenId,
    ) -> Result<Vec<AuthMethodRecord>, LifecycleError> {
        self.ensure_online()?;
        Ok(self
            .ledger
            .read()
            .entries
            .get(identity)
            .map(|entry| {
                entry
                    .methods
                    .iter()
                    .map(|(method, scopes)| AuthMethodRecord {
                        method: method.clone(),
                        scopes: scopes.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn owner_of(&self, identity: &TokenId) -> Result<Option<Owner>, LifecycleError> {
        self.ensure_online()?;
        Ok(self
            .ledger
            .read()
            .entries
            .get(identity)
            .map(|entry| entry.identity.owner()))
    }

    #[instrument(skip_all, fields(token_id = %identity))]
    async fn transfer(
        &self,
        identity: &TokenId,
        owner: Owner,
        credential: &SessionCredential,
    ) -> Result<Receipt, LifecycleError> {
        self.ensure_online()?;

        self.ledger.update(|ledger| -> Result<Receipt, LifecycleError> {
            ledger.authorize(&self.network, identity, credential)?;

            let entry = ledger.entry_mut(identity)?;
            let change = if entry.identity.owner() == owner {
                Change::Unchanged
            } else {
                entry.identity = entry.identity.clone().with_owner(owner);
                Change::Applied
            };
            debug!(?change, ?owner, "Transfer confirmed");

            Ok(ledger.confirm("transfer", identity, change))
        })
    }

    async fn identities_for(
        &self,
        method: &AuthMethodRef,
    ) -> Result<Vec<TokenId>, LifecycleError> {
        self.ensure_online()?;
        Ok(self
            .ledger
            .read()
            .entries
            .iter()
            .filter(|(_, entry)| entry.methods.contains_key(method))
            .map(|(token_id, _)| *token_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VolatileNetwork;
    use pkp_auth::{AuthMethodType, CapabilityRequest, Proof, ResourceId, SessionProvider};
    use pkp_common::time::Duration;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;
    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::wasm_bindgen_test;

    const ACTION: &str = "return true;";

    struct Fixture {
        network: VolatileNetwork,
        registry: VolatileRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let node = Ed25519Signer::import(&[1u8; 32]).unwrap();
            let network = VolatileNetwork::new(node, "localhost");
            let registry = VolatileRegistry::new(*network.verifier());
            Self { network, registry }
        }

        async fn action(&self, source: &str) -> Result<AuthMethodAssertion, LifecycleError> {
            self.network
                .authenticate(
                    AuthMethodType::Action,
                    &Proof::Action {
                        source: source.into(),
                    },
                )
                .await
        }

        async fn credential(
            &self,
            identity: &TokenId,
            assertion: &AuthMethodAssertion,
        ) -> Result<SessionCredential, LifecycleError> {
            self.network
                .issue_session_credential(
                    identity,
                    assertion,
                    &[CapabilityRequest::PkpSigning(ResourceId::Any)],
                    now() + Duration::from_secs(600),
                )
                .await
        }
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_mints_identities_with_one_permitted_method() -> TestResult {
        let fixture = Fixture::new();
        let bootstrap = fixture.action("bootstrap").await?;

        let identity = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;

        assert_eq!(
            fixture.registry.list_permitted(identity.token_id()).await?,
            vec![AuthMethodRecord {
                method: bootstrap.method.clone(),
                scopes: Scopes::sign_anything(),
            }]
        );
        assert_eq!(
            fixture.registry.owner_of(identity.token_id()).await?,
            Some(identity.owner())
        );
        assert_eq!(fixture.registry.height(), 1);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_rejects_mints_for_unattested_methods() -> TestResult {
        let fixture = Fixture::new();
        let mut bootstrap = fixture.action("bootstrap").await?;
        bootstrap.access_token = hex::encode([0u8; 64]);

        let result = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await;

        assert!(matches!(result, Err(LifecycleError::MintRejected(_))));
        assert_eq!(fixture.registry.height(), 0);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_rejects_mints_with_contradictory_scopes() -> TestResult {
        let fixture = Fixture::new();
        let bootstrap = fixture.action("bootstrap").await?;

        let result = fixture
            .registry
            .mint(
                &bootstrap,
                &Scopes::from([Scope::NoPermissions, Scope::SignAnything]),
            )
            .await;

        assert!(matches!(result, Err(LifecycleError::MintRejected(_))));
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_requires_sign_anything_to_authorize_mutations() -> TestResult {
        let fixture = Fixture::new();
        let bootstrap = fixture.action("bootstrap").await?;
        let limited = fixture.action(ACTION).await?;
        let identity = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;
        let token_id = identity.token_id();

        let credential = fixture.credential(token_id, &bootstrap).await?;
        fixture
            .registry
            .grant(
                token_id,
                &limited.method,
                &Scopes::from([Scope::PersonalSign]),
                &credential,
            )
            .await?;

        let limited_credential = fixture.credential(token_id, &limited).await?;
        let result = fixture
            .registry
            .revoke(token_id, &bootstrap.method, &limited_credential)
            .await;

        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));
        assert!(fixture.registry.is_permitted(token_id, &bootstrap.method).await?);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_rejects_credentials_without_signing_capability() -> TestResult {
        let fixture = Fixture::new();
        let bootstrap = fixture.action("bootstrap").await?;
        let identity = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;
        let token_id = identity.token_id();

        let credential = fixture
            .network
            .issue_session_credential(
                token_id,
                &bootstrap,
                &[CapabilityRequest::ActionExecution(ResourceId::Any)],
                now() + Duration::from_secs(600),
            )
            .await?;
        let other = fixture.action(ACTION).await?;
        let result = fixture
            .registry
            .grant(token_id, &other.method, &Scopes::sign_anything(), &credential)
            .await;

        assert!(matches!(result, Err(LifecycleError::Unauthorized(_))));
        assert!(!fixture.registry.is_permitted(token_id, &other.method).await?);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_rejects_scopes_outside_the_allowed_set() -> TestResult {
        let mut fixture = Fixture::new();
        fixture.registry = VolatileRegistry::new(*fixture.network.verifier())
            .with_allowed_scopes(Scopes::from([Scope::NoPermissions, Scope::SignAnything]));
        let bootstrap = fixture.action("bootstrap").await?;
        let identity = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;
        let token_id = identity.token_id();
        let credential = fixture.credential(token_id, &bootstrap).await?;
        let other = fixture.action(ACTION).await?;

        let result = fixture
            .registry
            .grant(
                token_id,
                &other.method,
                &Scopes::from([Scope::PersonalSign]),
                &credential,
            )
            .await;

        assert!(matches!(result, Err(LifecycleError::ScopeRejected(_))));
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_does_not_confirm_repeated_grants_or_revokes() -> TestResult {
        let fixture = Fixture::new();
        let bootstrap = fixture.action("bootstrap").await?;
        let other = fixture.action(ACTION).await?;
        let identity = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;
        let token_id = identity.token_id();
        let credential = fixture.credential(token_id, &bootstrap).await?;

        let first = fixture
            .registry
            .grant(token_id, &other.method, &Scopes::sign_anything(), &credential)
            .await?;
        let second = fixture
            .registry
            .grant(token_id, &other.method, &Scopes::sign_anything(), &credential)
            .await?;
        assert_eq!(first.change, Change::Applied);
        assert_eq!(second.change, Change::Unchanged);
        assert_eq!(second.block, first.block);

        fixture
            .registry
            .revoke(token_id, &other.method, &credential)
            .await?;
        let again = fixture
            .registry
            .revoke(token_id, &other.method, &credential)
            .await?;
        assert_eq!(again.change, Change::Unchanged);
        assert_eq!(fixture.registry.height(), 3);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_finds_identities_by_method() -> TestResult {
        let fixture = Fixture::new();
        let bootstrap = fixture.action("bootstrap").await?;
        let first = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;
        let second = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;

        let mut expected = vec![*first.token_id(), *second.token_id()];
        expected.sort();
        assert_eq!(
            fixture.registry.identities_for(&bootstrap.method).await?,
            expected
        );

        let unknown = fixture.action("unknown").await?;
        assert!(
            fixture
                .registry
                .identities_for(&unknown.method)
                .await?
                .is_empty()
        );
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), test_log::test(tokio::test))]
    async fn it_is_unavailable_while_offline() -> TestResult {
        let fixture = Fixture::new();
        let bootstrap = fixture.action("bootstrap").await?;
        let identity = fixture
            .registry
            .mint(&bootstrap, &Scopes::sign_anything())
            .await?;
        fixture.registry.set_online(false);

        let result = fixture
            .registry
            .is_permitted(identity.token_id(), &bootstrap.method)
            .await;

        assert!(matches!(
            result,
            Err(LifecycleError::ProviderUnavailable(_))
        ));
        Ok(())
    }
}
