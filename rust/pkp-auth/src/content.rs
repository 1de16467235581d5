//! Content addressing for action sources.
//!
//! An action auth method is identified by the content reference of its
//! source text, so the same source always maps to the same method.

use ipld_core::cid::{Cid, multihash::Multihash};
use pkp_common::{ConditionalSync, Sha256Hash};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Multicodec code of raw binary content.
pub const RAW_CODEC: u64 = 0x55;

/// Multihash code of SHA2-256.
pub const SHA2_256_CODE: u64 = 0x12;

/// A content-addressed identifier of action source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentReference(Cid);

impl ContentReference {
    /// The underlying CID.
    pub fn cid(&self) -> &Cid {
        &self.0
    }

    /// Binary form of the CID.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }
}

impl From<Cid> for ContentReference {
    fn from(value: Cid) -> Self {
        Self(value)
    }
}

impl Display for ContentReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Error returned when a string is not a CID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid content reference '{0}'")]
pub struct ContentReferenceParseError(String);

impl FromStr for ContentReference {
    type Err = ContentReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::try_from(s)
            .map(Self)
            .map_err(|_| ContentReferenceParseError(s.to_string()))
    }
}

impl TryFrom<String> for ContentReference {
    type Error = ContentReferenceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentReference> for String {
    fn from(value: ContentReference) -> Self {
        value.to_string()
    }
}

/// Computes content references for action sources.
pub trait ContentAddressing: ConditionalSync {
    /// Deterministic, collision-resistant reference for `source`.
    fn compute_reference(&self, source: &[u8]) -> ContentReference;
}

/// CIDv1 over the raw source bytes with a SHA2-256 multihash
/// (`bafkrei...`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSha256;

impl ContentAddressing for RawSha256 {
    fn compute_reference(&self, source: &[u8]) -> ContentReference {
        let digest = Sha256Hash::hash(source);
        let multihash = Multihash::<64>::wrap(SHA2_256_CODE, digest.bytes())
            .expect("a 32 byte digest fits a 64 byte multihash");
        ContentReference(Cid::new_v1(RAW_CODEC, multihash))
    }
}
