//! Session provider half of the volatile network.

use super::{attestation, verify_assertion};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use pkp_auth::{
    Address, AuthMethodAssertion, AuthMethodRef, AuthMethodType, CapabilityRequest,
    ContentAddressing, LifecycleError, MethodId, Proof, RawSha256, SessionClaims,
    SessionCredential, SessionProvider, SignInMessage, TokenId,
};
use pkp_common::time::{SystemTime, now, unix_seconds};
use pkp_credentials::{Authority, Ed25519KeyError, Ed25519Signer, Ed25519Verifier, Principal};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// The claims of a federated identity token this network looks at.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    aud: String,
    exp: u64,
}

/// An in-memory node network.
///
/// Verifies wallet sign-ins against their Ed25519 signatures, checks the
/// audience and expiry of federated tokens and addresses action sources.
/// Federated token signatures are not checked. Session credentials are
/// signed with the network's node key.
#[derive(Debug)]
pub struct VolatileNetwork<C = RawSha256> {
    node: Ed25519Signer,
    domain: String,
    client_id: Option<String>,
    addressing: C,
    online: AtomicBool,
}

impl VolatileNetwork {
    /// A network signing with `node` that accepts sign-ins for `domain`.
    pub fn new(node: Ed25519Signer, domain: impl Into<String>) -> Self {
        Self {
            node,
            domain: domain.into(),
            client_id: None,
            addressing: RawSha256,
            online: AtomicBool::new(true),
        }
    }

    /// A network with a freshly generated node key.
    pub fn generate(domain: impl Into<String>) -> Result<Self, Ed25519KeyError> {
        Ok(Self::new(Ed25519Signer::generate()?, domain))
    }
}

impl<C: ContentAddressing> VolatileNetwork<C> {
    /// Only accept federated tokens issued for `client_id`.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Address action sources with `addressing`.
    pub fn with_addressing<A: ContentAddressing>(self, addressing: A) -> VolatileNetwork<A> {
        VolatileNetwork {
            node: self.node,
            domain: self.domain,
            client_id: self.client_id,
            addressing,
            online: self.online,
        }
    }

    /// The verifier registries use to trust this network.
    pub fn verifier(&self) -> &Ed25519Verifier {
        self.node.verifier()
    }

    /// Simulate the network becoming reachable or unreachable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), LifecycleError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LifecycleError::ProviderUnavailable(format!(
                "node network {} is unreachable",
                self.node
            )))
        }
    }

    fn wallet_method(
        &self,
        message: &SignInMessage,
        signature: &[u8],
    ) -> Result<AuthMethodRef, LifecycleError> {
        if message.domain != self.domain {
            return Err(LifecycleError::InvalidProof(format!(
                "sign-in is for {} not {}",
                message.domain, self.domain
            )));
        }
        if message.is_expired_at(now()) {
            return Err(LifecycleError::InvalidProof("sign-in has expired".into()));
        }

        let wallet = Ed25519Verifier::try_from(&message.address)
            .map_err(|error| LifecycleError::InvalidProof(error.to_string()))?;
        wallet
            .verify(message.to_string().as_bytes(), signature)
            .map_err(|_| {
                LifecycleError::InvalidProof(format!("bad sign-in signature from {wallet}"))
            })?;

        let address = Address::derive(&wallet.to_bytes());
        Ok(AuthMethodRef::new(
            AuthMethodType::Wallet,
            MethodId::for_wallet(&address),
        ))
    }

    fn google_method(&self, token: &str) -> Result<AuthMethodRef, LifecycleError> {
        let payload = match token.split('.').collect::<Vec<_>>().as_slice() {
            [_, payload, _] => URL_SAFE_NO_PAD
                .decode(payload)
                .map_err(|error| LifecycleError::InvalidProof(error.to_string()))?,
            _ => {
                return Err(LifecycleError::InvalidProof(
                    "token is not a compact JWT".into(),
                ));
            }
        };
        let claims: TokenClaims = serde_json::from_slice(&payload)?;

        if self
            .client_id
            .as_ref()
            .is_some_and(|client_id| client_id != &claims.aud)
        {
            return Err(LifecycleError::InvalidProof(format!(
                "token was issued for {}",
                claims.aud
            )));
        }
        if claims.exp <= unix_seconds(now()) {
            return Err(LifecycleError::InvalidProof("token has expired".into()));
        }

        Ok(AuthMethodRef::new(
            AuthMethodType::GoogleJwt,
            MethodId::for_google(&claims.sub, &claims.aud),
        ))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C: ContentAddressing> SessionProvider for VolatileNetwork<C> {
    async fn authenticate(
        &self,
        kind: AuthMethodType,
        proof: &Proof,
    ) -> Result<AuthMethodAssertion, LifecycleError> {
        self.ensure_online()?;
        if proof.kind() != kind {
            return Err(LifecycleError::InvalidProof(format!(
                "a {} proof cannot satisfy a {kind} auth method",
                proof.kind()
            )));
        }

        let method = match proof {
            Proof::Wallet { message, signature } => self.wallet_method(message, signature)?,
            Proof::GoogleJwt { token } => self.google_method(token)?,
            Proof::Action { source } => {
                AuthMethodRef::action(&self.addressing.compute_reference(source.as_bytes()))
            }
        };
        let signature = self.node.sign(&attestation(&method)?).await?;
        debug!(%method, "Attested auth method");

        Ok(AuthMethodAssertion {
            method,
            access_token: hex::encode(signature),
        })
    }

    async fn issue_session_credential(
        &self,
        identity: &TokenId,
        assertion: &AuthMethodAssertion,
        capabilities: &[CapabilityRequest],
        expiration: SystemTime,
    ) -> Result<SessionCredential, LifecycleError> {
        self.ensure_online()?;
        verify_assertion(self.node.verifier(), assertion)?;

        let issued_at = unix_seconds(now());
        let expiration = unix_seconds(expiration);
        if expiration <= issued_at {
            return Err(LifecycleError::InvalidProof(
                "session credential would already be expired".into(),
            ));
        }

        SessionClaims {
            identity: *identity,
            method: assertion.method.clone(),
            issuer: self.node.did(),
            issued_at,
            expiration,
            capabilities: capabilities.to_vec(),
        }
        .sign(&self.node)
        .await
    }
}
