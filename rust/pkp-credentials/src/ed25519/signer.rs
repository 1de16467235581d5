//! Ed25519 signer implementation.

use super::{error::Ed25519KeyError, verifier::Ed25519Verifier};
use crate::{Authority, Did, Principal, SignError};
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};

/// An `Ed25519` `did:key` signer.
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    did: Ed25519Verifier,
    signer: SigningKey,
}

impl From<SigningKey> for Ed25519Signer {
    fn from(signer: SigningKey) -> Self {
        let did = Ed25519Verifier::from(signer.verifying_key());
        Self { did, signer }
    }
}

impl Ed25519Signer {
    /// Generate a new Ed25519 keypair from the platform RNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the RNG fails.
    pub fn generate() -> Result<Self, Ed25519KeyError> {
        let mut seed = [0u8; 32];
        getrandom::getrandom(&mut seed)?;
        Ok(SigningKey::from_bytes(&seed).into())
    }

    /// Import a keypair from its 32 byte seed.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed has the wrong length.
    pub fn import(seed: &[u8]) -> Result<Self, Ed25519KeyError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Ed25519KeyError::InvalidSeedLength(seed.len()))?;
        Ok(SigningKey::from_bytes(&seed).into())
    }

    /// Get the associated Ed25519 DID (verifier).
    #[must_use]
    pub const fn verifier(&self) -> &Ed25519Verifier {
        &self.did
    }
}

impl std::fmt::Display for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.did)
    }
}

impl Principal for Ed25519Signer {
    fn did(&self) -> Did {
        self.did.did()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Authority for Ed25519Signer {
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SignError> {
        self.signer
            .try_sign(payload)
            .map(|signature| signature.to_bytes().to_vec())
            .map_err(|error| SignError::SigningFailed(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;
    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::wasm_bindgen_test;

    /// Create a deterministic test signer from a seed.
    fn test_signer(seed: u8) -> Ed25519Signer {
        Ed25519Signer::import(&[seed; 32]).unwrap()
    }

    #[test]
    fn ed25519_did_round_trip() -> TestResult {
        let signer = test_signer(0);
        let did_string = signer.verifier().to_string();
        assert!(did_string.starts_with("did:key:z6Mk"));

        let parsed: Ed25519Verifier = did_string.parse()?;
        assert_eq!(&parsed, signer.verifier());
        assert_eq!(Principal::did(&signer).as_str(), did_string);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_produces_verifiable_signatures() -> TestResult {
        let signer = test_signer(42);
        let msg = b"localhost wants you to sign in with your account";

        let signature = signer.sign(msg).await?;
        signer.verifier().verify(msg, &signature)?;
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_rejects_signatures_from_other_keys() -> TestResult {
        let signer = test_signer(7);
        let other = test_signer(8);
        let msg = b"grant";

        let signature = other.sign(msg).await?;
        assert!(signer.verifier().verify(msg, &signature).is_err());
        assert!(signer.verifier().verify(b"revoke", &signer.sign(msg).await?).is_err());
        Ok(())
    }

    #[test]
    fn it_rejects_short_seeds() {
        assert!(matches!(
            Ed25519Signer::import(&[1u8; 16]),
            Err(Ed25519KeyError::InvalidSeedLength(16))
        ));
    }

    #[test]
    fn it_generates_distinct_keys() -> TestResult {
        let first = Ed25519Signer::generate()?;
        let second = Ed25519Signer::generate()?;
        assert_ne!(first.verifier(), second.verifier());
        Ok(())
    }
}
