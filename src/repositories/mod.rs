//! # Repository Module
//!
//! Persistence layer of the relayer. The message store is the only shared mutable state
//! between the processor loops of a running instance.

mod message;
pub use message::*;

pub mod redis_base;
