//! Background loops running the message processors.
//!
//! Every processor gets its own tokio task. Tasks run until the shared running flag is
//! cleared and finish the iteration in flight before exiting.
mod poller;
pub use poller::*;

mod sent_event_poller;
pub use sent_event_poller::*;
