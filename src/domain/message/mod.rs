//! Processors driving messages through their lifecycle.
//!
//! Each processor performs one bounded step per call and is run on a fixed interval by a
//! poller. They only coordinate through the message store.
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::models::ProcessorError;

mod nonce;
pub use nonce::*;

mod sent_event;
pub use sent_event::*;

mod anchoring;
pub use anchoring::*;

mod transaction_size;
pub use transaction_size::*;

mod claiming;
pub use claiming::*;

mod persister;
pub use persister::*;

mod cleaner;
pub use cleaner::*;

#[async_trait]
#[cfg_attr(test, automock)]
pub trait MessageProcessor: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Runs one processing step.
    async fn process(&self) -> Result<(), ProcessorError>;
}
