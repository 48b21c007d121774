//! Chain access: a JSON-RPC provider per chain with retrying calls.
pub mod evm;
pub use evm::*;

mod retry;
pub use retry::*;
