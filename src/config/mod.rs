//! Configuration of the relayer.
//!
//! Process-level settings (storage backend, RPC timeouts, config file location) come from
//! the environment through [`ServerConfig`]. Everything about the two chains and how
//! messages are claimed on them comes from the JSON file loaded with [`load_config`].
mod server_config;
pub use server_config::*;

mod config_file;
pub use config_file::*;

mod error;
pub use error::*;
