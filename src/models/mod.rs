//! # Models Module
//!
//! Message records, chain-facing payloads and the error types shared across the relayer.

mod message;
pub use message::*;

mod chain;
pub use chain::*;

mod gas;
pub use gas::*;

mod error;
pub use error::*;

mod secret_string;
pub use secret_string::*;

mod plain_or_env_value;
pub use plain_or_env_value::*;
