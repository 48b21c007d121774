//! This module contains all the constant values used in the system
mod listener;
pub use listener::*;

mod claiming;
pub use claiming::*;

mod gas;
pub use gas::*;

mod provider;
pub use provider::*;
