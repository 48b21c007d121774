//! # Services Module
//!
//! Chain-facing integrations: RPC providers, claim signing, message service bindings,
//! gas pricing, claim validation and calldata filtering.

mod provider;
pub use provider::*;

mod signer;
pub use signer::*;

mod contracts;
pub use contracts::*;

mod gas;
pub use gas::*;

mod validation;
pub use validation::*;

mod calldata;
pub use calldata::*;
