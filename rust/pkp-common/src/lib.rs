#![warn(missing_docs)]

//! Light weight helpers shared by the pkp crates: cross-target `Send`/`Sync`
//! bounds, a shared interior-mutability cell, SHA-256 digests and wall-clock
//! time.

mod sync;
pub use sync::*;

mod hash;
pub use hash::*;

pub mod time;
