//! The programmable key pair identity.

use pkp_common::Sha256Hash;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Unique token identifier of a minted identity.
///
/// Derived from the identity's public key, rendered as `0x`-prefixed hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(Sha256Hash);

/// Error returned when parsing a hex identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{input}'")]
pub struct HexParseError {
    kind: &'static str,
    input: String,
}

fn parse_hex<const N: usize>(kind: &'static str, input: &str) -> Result<[u8; N], HexParseError> {
    let error = || HexParseError {
        kind,
        input: input.to_string(),
    };
    let digits = input.strip_prefix("0x").ok_or_else(error)?;
    let bytes = hex::decode(digits).map_err(|_| error())?;
    bytes.try_into().map_err(|_| error())
}

impl TokenId {
    /// Derive the token id for a public key.
    pub fn derive(public_key: &PublicKey) -> Self {
        Self(Sha256Hash::hash(public_key.as_bytes()))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.bytes()
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for TokenId {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex::<32>("token id", s).map(|bytes| Self(bytes.into()))
    }
}

impl TryFrom<String> for TokenId {
    type Error = HexParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenId> for String {
    fn from(value: TokenId) -> Self {
        value.to_string()
    }
}

/// A 20 byte account address derived from a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// Derive the address owning `public_key`: the trailing 20 bytes of its
    /// SHA-256 digest.
    pub fn derive(public_key: &[u8]) -> Self {
        let digest = Sha256Hash::hash(public_key);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest.bytes()[12..]);
        Self(address)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex::<20>("address", s).map(Self)
    }
}

impl TryFrom<String> for Address {
    type Error = HexParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

/// Public key of a minted identity. The matching secret is held by the node
/// network and never leaves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "hex_bytes")] Vec<u8>);

impl PublicKey {
    /// Wrap raw public key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Who controls transfers of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "address")]
pub enum Owner {
    /// An external account, typically the wallet that minted the identity.
    Account(Address),
    /// The identity owns itself; only its permitted auth methods act for it.
    Itself,
}

/// A minted programmable key pair.
///
/// Returned by mint and threaded by the caller into every subsequent call.
/// Apart from [`Identity::owner`], all fields are fixed at mint time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    token_id: TokenId,
    public_key: PublicKey,
    address: Address,
    owner: Owner,
}

impl Identity {
    /// Assemble an identity for `public_key`, deriving its token id and
    /// address.
    pub fn new(public_key: PublicKey, owner: Owner) -> Self {
        Self {
            token_id: TokenId::derive(&public_key),
            address: Address::derive(public_key.as_bytes()),
            public_key,
            owner,
        }
    }

    /// The unique token identifier.
    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    /// The identity's public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The address derived from the public key.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The current owner.
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// The same identity under a different owner.
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| serde::de::Error::custom("expected 0x-prefixed hex"))?;
        hex::decode(digits).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn identity() -> Identity {
        let key = PublicKey::new([7u8; 32]);
        let owner = Owner::Account(Address::derive(&[1u8; 32]));
        Identity::new(key, owner)
    }

    #[test]
    fn it_derives_token_id_and_address_from_the_key() {
        let identity = identity();
        assert_eq!(identity.token_id(), &TokenId::derive(identity.public_key()));
        assert_eq!(identity.address(), &Address::derive(&[7u8; 32]));
        assert_eq!(identity.address().to_string().len(), 42);
    }

    #[test]
    fn it_only_changes_the_owner() {
        let before = identity();
        let after = before.clone().with_owner(Owner::Itself);

        assert_eq!(after.owner(), Owner::Itself);
        assert_eq!(after.token_id(), before.token_id());
        assert_eq!(after.public_key(), before.public_key());
    }

    #[test]
    fn it_parses_rendered_identifiers() -> TestResult {
        let identity = identity();

        let token: TokenId = identity.token_id().to_string().parse()?;
        assert_eq!(&token, identity.token_id());

        let address: Address = identity.address().to_string().parse()?;
        assert_eq!(&address, identity.address());

        assert!("deadbeef".parse::<Address>().is_err());
        assert!("0xdeadbeef".parse::<TokenId>().is_err());
        Ok(())
    }

    #[test]
    fn it_serializes_identifiers_as_hex_strings() -> TestResult {
        let identity = identity();
        let json = serde_json::to_value(&identity)?;

        assert_eq!(json["token_id"], identity.token_id().to_string());
        assert_eq!(json["public_key"], identity.public_key().to_string());

        let back: Identity = serde_json::from_value(json)?;
        assert_eq!(back, identity);
        Ok(())
    }
}
