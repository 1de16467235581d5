#![warn(missing_docs)]

//! In-memory collaborators for the pkp lifecycle.
//!
//! [`VolatileNetwork`] stands in for the node network: it verifies
//! authentication proofs and signs session credentials with its node key.
//! [`VolatileRegistry`] stands in for the permission contracts: it trusts
//! only credentials signed by that key and enforces the permission rules on
//! every mutation. Neither persists anything. Their primary use is testing
//! and local development against the [`pkp_auth::Lifecycle`] manager.

pub mod volatile;
pub use volatile::*;
