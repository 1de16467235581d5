//! Short-lived, capability-scoped session credentials.
//!
//! A credential is issued by the node network for one identity and one
//! satisfied auth method. It lists the resource/ability pairs it may be used
//! for and carries the network's signature over its claims. Credentials are
//! never persisted; whether the underlying auth method is still permitted is
//! decided by the registry each time the credential is presented.

use crate::{AuthMethodRef, LifecycleError, TokenId};
use pkp_common::time::{SystemTime, from_unix_seconds};
use pkp_credentials::{Authority, Did, Ed25519Verifier, Principal};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The resource half of a capability request: one specific id or every
/// resource of the kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceId {
    /// Every resource (`*`).
    Any,
    /// One resource, by id.
    Specific(String),
}

impl ResourceId {
    /// Whether this resource id covers `id`.
    pub fn matches(&self, id: &str) -> bool {
        match self {
            ResourceId::Any => true,
            ResourceId::Specific(own) => own == id,
        }
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        if value == "*" {
            ResourceId::Any
        } else {
            ResourceId::Specific(value)
        }
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.to_string()
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceId::Any => f.write_str("*"),
            ResourceId::Specific(id) => f.write_str(id),
        }
    }
}

/// A resource + ability pair a session credential is requested for.
///
/// Each ability only applies to one resource kind, so the pair is a single
/// enum and mismatched pairs cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "ability", content = "resource")]
pub enum CapabilityRequest {
    /// Sign with the identity's key, which includes authorizing permission
    /// changes on it.
    PkpSigning(ResourceId),
    /// Execute actions.
    #[serde(rename = "lit-action-execution")]
    ActionExecution(ResourceId),
}

impl CapabilityRequest {
    /// The ability name.
    pub fn ability(&self) -> &'static str {
        match self {
            CapabilityRequest::PkpSigning(_) => "pkp-signing",
            CapabilityRequest::ActionExecution(_) => "lit-action-execution",
        }
    }

    /// The resource URI.
    pub fn resource(&self) -> String {
        match self {
            CapabilityRequest::PkpSigning(id) => format!("lit-pkp://{id}"),
            CapabilityRequest::ActionExecution(id) => format!("lit-litaction://{id}"),
        }
    }

    /// Whether this request grants signing for `identity`.
    pub fn grants_signing_for(&self, identity: &TokenId) -> bool {
        match self {
            CapabilityRequest::PkpSigning(id) => id.matches(&identity.to_string()),
            CapabilityRequest::ActionExecution(_) => false,
        }
    }
}

/// The signed body of a [`SessionCredential`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The identity the credential acts for.
    pub identity: TokenId,
    /// The auth method the credential was derived from.
    pub method: AuthMethodRef,
    /// The node network that issued the credential.
    pub issuer: Did,
    /// Unix seconds at issuance.
    pub issued_at: u64,
    /// Unix seconds after which the credential is void.
    pub expiration: u64,
    /// Resource/ability pairs the credential covers.
    pub capabilities: Vec<CapabilityRequest>,
}

impl SessionClaims {
    /// The canonical bytes that get signed.
    pub fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Sign these claims with the issuing `authority`.
    pub async fn sign<A: Authority>(
        self,
        authority: &A,
    ) -> Result<SessionCredential, LifecycleError> {
        if authority.did() != self.issuer {
            return Err(LifecycleError::InvalidProof(format!(
                "claims name {} as issuer but are signed by {}",
                self.issuer,
                authority.did()
            )));
        }
        let signature = authority.sign(&self.payload()?).await?;
        Ok(SessionCredential {
            claims: self,
            signature,
        })
    }
}

/// A session credential: claims plus the issuer's signature over them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    claims: SessionClaims,
    #[serde(with = "crate::identity::hex_bytes")]
    signature: Vec<u8>,
}

impl SessionCredential {
    /// The signed claims.
    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    /// The identity the credential acts for.
    pub fn identity(&self) -> &TokenId {
        &self.claims.identity
    }

    /// The auth method the credential was derived from.
    pub fn method(&self) -> &AuthMethodRef {
        &self.claims.method
    }

    /// Expiration as a point in time.
    pub fn expiration(&self) -> SystemTime {
        from_unix_seconds(self.claims.expiration)
    }

    /// Whether the credential has expired at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expiration() <= now
    }

    /// Whether the credential carries `pkp-signing` for `identity`.
    pub fn grants_signing_for(&self, identity: &TokenId) -> bool {
        self.claims
            .capabilities
            .iter()
            .any(|capability| capability.grants_signing_for(identity))
    }

    /// Check that the credential was issued and signed by `issuer`.
    pub fn verify_issued_by(&self, issuer: &Ed25519Verifier) -> Result<(), LifecycleError> {
        if self.claims.issuer != issuer.did() {
            return Err(LifecycleError::Unauthorized(format!(
                "credential issued by untrusted {}",
                self.claims.issuer
            )));
        }
        issuer
            .verify(&self.claims.payload()?, &self.signature)
            .map_err(|_| {
                LifecycleError::Unauthorized("credential signature does not verify".into())
            })
    }
}
