//! Auth methods, their identifiers and the scopes granted to them.
//!
//! # Record lifecycle
//!
//! ```text
//! Unregistered ──grant──▶ Permitted ──revoke──▶ Revoked
//!       ▲                                          │
//!       └────────────── (same as never granted) ◀──┘
//! ```
//!
//! The registry keeps no tombstones: a revoked reference is
//! indistinguishable from one that was never granted, so granting it again
//! creates a fresh permitted record.

use crate::{Address, ContentReference, identity::hex_bytes};
use pkp_common::Sha256Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// The kind of proof an auth method is satisfied by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethodType {
    /// A signature from an externally held wallet key.
    Wallet,
    /// An executable action, identified by the content reference of its
    /// source.
    Action,
    /// A federated identity token issued by Google.
    GoogleJwt,
}

impl Display for AuthMethodType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AuthMethodType::Wallet => "wallet",
            AuthMethodType::Action => "action",
            AuthMethodType::GoogleJwt => "google-jwt",
        })
    }
}

/// Opaque identifier of an auth method, unique within its
/// [`AuthMethodType`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId(#[serde(with = "hex_bytes")] Vec<u8>);

impl MethodId {
    /// Wrap raw identifier bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Identifier of a wallet auth method: `H("{address}:lit")`.
    pub fn for_wallet(address: &Address) -> Self {
        Self::digest(format!("{address}:lit").as_bytes())
    }

    /// Identifier of a federated auth method: `H("{subject}:{audience}")`,
    /// binding the user to the application the token was issued for.
    pub fn for_google(subject: &str, audience: &str) -> Self {
        Self::digest(format!("{subject}:{audience}").as_bytes())
    }

    /// Identifier of an action auth method: the binary form of its content
    /// reference.
    pub fn for_action(reference: &ContentReference) -> Self {
        Self(reference.to_bytes())
    }

    fn digest(input: &[u8]) -> Self {
        Self(Sha256Hash::hash(input).bytes().to_vec())
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for MethodId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Reference to an auth method: its type tag plus its identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuthMethodRef {
    /// The method type.
    pub kind: AuthMethodType,
    /// The method identifier.
    pub id: MethodId,
}

impl AuthMethodRef {
    /// Create a new reference.
    pub fn new(kind: AuthMethodType, id: MethodId) -> Self {
        Self { kind, id }
    }

    /// Reference to the action whose source has `reference`.
    pub fn action(reference: &ContentReference) -> Self {
        Self::new(AuthMethodType::Action, MethodId::for_action(reference))
    }
}

impl Display for AuthMethodRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Extent of signing authority granted to a permitted auth method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// The method is recorded but may not sign anything.
    NoPermissions,
    /// Unrestricted signing, including authorizing permission changes.
    SignAnything,
    /// Signing restricted to personal messages.
    PersonalSign,
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Scope::NoPermissions => "no-permissions",
            Scope::SignAnything => "sign-anything",
            Scope::PersonalSign => "personal-sign",
        })
    }
}

/// Why a scope set cannot be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScopeViolation {
    /// `no-permissions` was combined with a signing scope.
    #[error("no-permissions cannot be combined with other scopes")]
    Contradictory,
    /// The scope is not one the registry grants.
    #[error("scope {0} is not permitted by the registry")]
    NotAllowed(Scope),
}

/// A set of scopes granted to one auth method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scopes(BTreeSet<Scope>);

impl Scopes {
    /// The empty set.
    pub fn none() -> Self {
        Self::default()
    }

    /// `{sign-anything}`, the scope bound to the initial auth method at mint.
    pub fn sign_anything() -> Self {
        [Scope::SignAnything].into()
    }

    /// Every scope the contracts know about.
    pub fn all() -> Self {
        [Scope::NoPermissions, Scope::SignAnything, Scope::PersonalSign].into()
    }

    /// Whether `scope` is in the set.
    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the scopes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    /// Check that this set is consistent and only uses scopes in `allowed`.
    pub fn check(&self, allowed: &Scopes) -> Result<(), ScopeViolation> {
        if self.contains(Scope::NoPermissions) && self.0.len() > 1 {
            return Err(ScopeViolation::Contradictory);
        }
        match self.iter().find(|scope| !allowed.contains(*scope)) {
            Some(scope) => Err(ScopeViolation::NotAllowed(scope)),
            None => Ok(()),
        }
    }
}

impl<const N: usize> From<[Scope; N]> for Scopes {
    fn from(value: [Scope; N]) -> Self {
        Self(value.into_iter().collect())
    }
}

impl FromIterator<Scope> for Scopes {
    fn from_iter<T: IntoIterator<Item = Scope>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for Scopes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.iter().map(|scope| scope.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// A permitted auth method of an identity, with its scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMethodRecord {
    /// The permitted method.
    pub method: AuthMethodRef,
    /// The scopes granted to it.
    pub scopes: Scopes,
}

/// Outcome of a successful authentication: proof that the caller satisfies
/// an auth method right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMethodAssertion {
    /// The satisfied method.
    pub method: AuthMethodRef,
    /// Opaque token the provider can later exchange for session credentials.
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_derives_stable_wallet_ids() {
        let address = Address::derive(b"wallet public key");
        assert_eq!(MethodId::for_wallet(&address), MethodId::for_wallet(&address));
        assert_ne!(
            MethodId::for_wallet(&address),
            MethodId::for_wallet(&Address::derive(b"another key"))
        );
    }

    #[test]
    fn it_binds_google_ids_to_the_audience() {
        assert_ne!(
            MethodId::for_google("user-1", "app-a"),
            MethodId::for_google("user-1", "app-b")
        );
    }

    #[test]
    fn it_rejects_contradictory_scopes() {
        let scopes = Scopes::from([Scope::NoPermissions, Scope::SignAnything]);
        assert_eq!(
            scopes.check(&Scopes::all()),
            Err(ScopeViolation::Contradictory)
        );
        assert_eq!(Scopes::from([Scope::NoPermissions]).check(&Scopes::all()), Ok(()));
    }

    #[test]
    fn it_rejects_scopes_outside_the_allowed_set() {
        let allowed = Scopes::from([Scope::PersonalSign]);
        assert_eq!(
            Scopes::sign_anything().check(&allowed),
            Err(ScopeViolation::NotAllowed(Scope::SignAnything))
        );
        assert_eq!(Scopes::none().check(&allowed), Ok(()));
    }

    #[test]
    fn it_renders_references_with_their_kind() {
        let method = AuthMethodRef::new(AuthMethodType::GoogleJwt, MethodId::new([0xab, 0x01]));
        assert_eq!(method.to_string(), "google-jwt:0xab01");
        assert_eq!(
            Scopes::from([Scope::PersonalSign, Scope::SignAnything]).to_string(),
            "{sign-anything, personal-sign}"
        );
    }
}
