//! # Domain Module
//!
//! Message lifecycle processors of the relayer.

mod message;
pub use message::*;
