//! Ed25519 `did:key` signer and verifier.

mod error;
mod signer;
mod verifier;

pub use error::{Ed25519DidFromStrError, Ed25519KeyError};
pub use signer::Ed25519Signer;
pub use verifier::Ed25519Verifier;

/// Multicodec prefix of an Ed25519 public key inside a `did:key`.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];
