mod status;
pub use status::*;

#[allow(clippy::module_inception)]
mod message;
pub use message::*;
