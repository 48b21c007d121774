//! Typed access to the message service contracts.
mod abi;
pub use abi::IMessageService;

mod errors;
pub use errors::*;

mod log_client;
pub use log_client::*;

mod message_service;
pub use message_service::*;
