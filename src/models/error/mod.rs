mod store;
pub use store::*;

mod provider;
pub use provider::*;

mod chain;
pub use chain::*;

mod processor;
pub use processor::*;

mod validation;
pub use validation::*;

mod expression;
pub use expression::*;
