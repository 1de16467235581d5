use std::array::TryFromSliceError;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The size of a SHA-256 digest in bytes.
pub const SHA256_HASH_SIZE: usize = 32;

/// A SHA-256 digest.
///
/// Used wherever an identifier is derived from other material: token ids
/// from public keys, auth method ids from addresses or claims, transaction
/// hashes from registry mutations.
///
/// # Examples
///
/// ```rust
/// use pkp_common::Sha256Hash;
///
/// let hash = Sha256Hash::hash(b"hello world");
/// assert_eq!(
///     hash.to_string(),
///     "0xb94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
/// );
/// ```
#[derive(
    Clone, Copy, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Sha256Hash([u8; SHA256_HASH_SIZE]);

impl Sha256Hash {
    /// Computes the SHA-256 digest of the given bytes.
    pub fn hash(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Computes the SHA-256 digest over a sequence of chunks, as if they were
    /// concatenated.
    pub fn hash_iter<'a, I>(chunks: I) -> Self
    where
        I: Iterator<Item = &'a [u8]>,
    {
        let mut hasher = Sha256::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        Self(hasher.finalize().into())
    }

    /// The raw digest.
    pub fn bytes(&self) -> &[u8; SHA256_HASH_SIZE] {
        &self.0
    }
}

impl From<[u8; SHA256_HASH_SIZE]> for Sha256Hash {
    fn from(value: [u8; SHA256_HASH_SIZE]) -> Self {
        Sha256Hash(value)
    }
}

impl TryFrom<&[u8]> for Sha256Hash {
    type Error = TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Sha256Hash(value.try_into()?))
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Renders as `0x`-prefixed lowercase hex, the way chain explorers show
/// token ids and transaction hashes.
impl Display for Sha256Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_hashes_chunks_like_concatenated_input() {
        let whole = Sha256Hash::hash(b"did:key:z6Mk:lit");
        let chunks: [&[u8]; 3] = [b"did:key:", b"z6Mk", b":lit"];
        let chunked = Sha256Hash::hash_iter(chunks.into_iter());

        assert_eq!(whole, chunked);
    }

    #[test]
    fn it_rejects_wrong_length_slices() {
        assert!(Sha256Hash::try_from([0u8; 31].as_slice()).is_err());
        assert!(Sha256Hash::try_from([0u8; 32].as_slice()).is_ok());
    }
}
