//! Integration tests exercising the public API against the in-memory store.
mod logging;
mod metrics;
mod pipeline;
