//! Property-based tests.
mod expression;
mod fees;
mod logging;
