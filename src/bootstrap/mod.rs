//! Initialization routines for the postman
//!
//! # Submodules
//!
//! - `initialize_repository`: builds the message store selected by the environment
//! - `initialize_pollers`: wires both chains into the pollers of each direction
mod initialize_repository;
pub use initialize_repository::*;

mod initialize_pollers;
pub use initialize_pollers::*;
