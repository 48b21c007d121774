use std::collections::BTreeMap;

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    hex,
    json_abi::{Function, Param},
};

use super::Value;
use crate::models::ExpressionError;

/// Decodes calldata of one function into an object keyed by argument names.
#[derive(Debug, Clone)]
pub struct CalldataDecoder {
    function: Function,
}

/// Named tuples become objects, everything else goes through [`Value::from`].
fn to_value(param: &Param, value: DynSolValue) -> Value {
    match value {
        DynSolValue::Tuple(items) if !param.components.is_empty() => Value::Object(
            param
                .components
                .iter()
                .zip(items)
                .enumerate()
                .map(|(index, (component, item))| (field_name(component, index), to_value(component, item)))
                .collect(),
        ),
        other => Value::from(other),
    }
}

fn field_name(param: &Param, index: usize) -> String {
    if param.name.is_empty() {
        index.to_string()
    } else {
        param.name.clone()
    }
}

impl CalldataDecoder {
    /// Parses a human readable signature such as `function foo(uint256 a, address b)`.
    pub fn new(function_interface: &str) -> Result<Self, ExpressionError> {
        let function = Function::parse(function_interface)
            .map_err(|e| ExpressionError::InvalidFunctionInterface(e.to_string()))?;
        Ok(Self { function })
    }

    pub fn selector(&self) -> [u8; 4] {
        self.function.selector().0
    }

    /// Returns `{ funcSignature, <argument name>: <value>, ... }`.
    pub fn decode(&self, calldata: &[u8]) -> Result<Value, ExpressionError> {
        let (selector, arguments) = calldata
            .split_first_chunk::<4>()
            .ok_or_else(|| ExpressionError::Decode("calldata shorter than a selector".to_string()))?;

        if *selector != self.selector() {
            return Err(ExpressionError::Decode(format!(
                "selector {} does not match {}",
                hex::encode_prefixed(selector),
                self.function.signature()
            )));
        }

        let values = self
            .function
            .abi_decode_input(arguments, true)
            .map_err(|e| ExpressionError::Decode(e.to_string()))?;

        let mut fields: BTreeMap<String, Value> = self
            .function
            .inputs
            .iter()
            .zip(values)
            .enumerate()
            .map(|(index, (param, value))| (field_name(param, index), to_value(param, value)))
            .collect();
        fields.insert(
            "funcSignature".to_string(),
            Value::Str(hex::encode_prefixed(selector)),
        );

        Ok(Value::Object(fields))
    }
}
