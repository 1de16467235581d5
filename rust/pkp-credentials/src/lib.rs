//! Concrete key and signing types for the pkp lifecycle.
//!
//! The node network signs session credentials and wallets sign sign-in
//! messages; both are modelled here as Ed25519 `did:key` principals
//! implementing the [`Principal`] and [`Authority`] traits.

mod did;
pub use did::*;

mod authority;
pub use authority::*;

pub mod ed25519;
pub use ed25519::{Ed25519DidFromStrError, Ed25519KeyError, Ed25519Signer, Ed25519Verifier};
