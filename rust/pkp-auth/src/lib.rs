#![warn(missing_docs)]

//! Authorization lifecycle for programmable key pairs.
//!
//! A programmable key pair (an [`Identity`]) is controlled by whichever auth
//! methods the [`PermissionRegistry`] currently permits on it. This crate
//! models those methods, their scopes and the short-lived
//! [`SessionCredential`]s derived from them, and provides the [`Lifecycle`]
//! manager that sequences the lifecycle:
//!
//! 1. **mint** an identity bound to an initial auth method,
//! 2. **grant** further auth methods, each authorized by a credential from a
//!    method that is already permitted,
//! 3. **check** which methods are permitted,
//! 4. **revoke** methods, never the last one.
//!
//! The node network and the permission contracts are collaborators behind
//! the [`SessionProvider`] and [`PermissionRegistry`] traits. Action sources
//! are addressed through [`ContentAddressing`].

mod error;
pub use error::*;

mod identity;
pub use identity::{Address, HexParseError, Identity, Owner, PublicKey, TokenId};

mod method;
pub use method::*;

mod content;
pub use content::*;

mod proof;
pub use proof::*;

mod session;
pub use session::*;

mod registry;
pub use registry::*;

mod provider;
pub use provider::*;

mod settings;
pub use settings::*;

mod lifecycle;
pub use lifecycle::*;
