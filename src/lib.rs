//! Cross-chain message relayer library
//!
//! Watches the message service contracts of an L1 and an L2 chain, follows every message
//! from the `MessageSent` event on its origin chain to a claim transaction on its
//! destination chain, and records each step in a shared message store.
//!
//! # Module Structure
//!
//! - `bootstrap`: wiring of stores, clients and pollers
//! - `config`: environment and JSON file configuration
//! - `domain`: the message processors of each pipeline stage
//! - `jobs`: background loops driving the processors
//! - `logging`: log setup
//! - `metrics`: Prometheus metrics fed by store writes
//! - `models`: messages, chain payloads and errors
//! - `repositories`: message store backends
//! - `services`: providers, signers, contract clients, gas and validation
//! - `utils`: common helpers

pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod domain;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
