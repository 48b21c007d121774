//! Calldata filtering of sent messages.
//!
//! A [`CalldataFilter`] is compiled once from configuration and evaluated against every
//! event carrying calldata. The expression sees the message fields (`from`, `to`, `fee`,
//! `value`, `messageNumber`) and the decoded call under `calldata`.
use std::collections::BTreeMap;

use crate::models::{ExpressionError, MessageSentEvent};

mod decoder;
pub use decoder::*;

mod expression;
pub use expression::*;

mod value;
pub use value::*;

#[derive(Debug, Clone)]
pub struct CalldataFilter {
    expression: Expression,
    decoder: CalldataDecoder,
}

impl CalldataFilter {
    pub fn compile(criteria_expression: &str, function_interface: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            expression: Expression::compile(criteria_expression)?,
            decoder: CalldataDecoder::new(function_interface)?,
        })
    }

    pub fn expression(&self) -> &str {
        self.expression.source()
    }

    fn context(&self, event: &MessageSentEvent) -> Result<Value, ExpressionError> {
        let mut root = BTreeMap::new();
        root.insert("from".to_string(), Value::Str(event.message_sender.to_string()));
        root.insert("to".to_string(), Value::Str(event.destination.to_string()));
        root.insert("fee".to_string(), Value::Number(event.fee));
        root.insert("value".to_string(), Value::Number(event.value));
        root.insert("messageNumber".to_string(), Value::Number(event.message_nonce));
        root.insert("calldata".to_string(), self.decoder.decode(&event.calldata)?);
        Ok(Value::Object(root))
    }

    /// Whether the event satisfies the filter. Undecodable calldata is an error.
    pub fn matches(&self, event: &MessageSentEvent) -> Result<bool, ExpressionError> {
        self.expression.test(&self.context(event)?)
    }
}
