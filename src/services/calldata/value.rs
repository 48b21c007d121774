use std::{cmp::Ordering, collections::BTreeMap, fmt};

use alloy::{
    dyn_abi::DynSolValue,
    hex,
    primitives::U256,
};

use crate::models::ExpressionError;

/// Value manipulated by filter expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Number(U256),
    Str(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn as_bool(&self) -> Result<bool, ExpressionError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ExpressionError::TypeMismatch(format!(
                "expected bool, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_number(&self) -> Result<U256, ExpressionError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(ExpressionError::TypeMismatch(format!(
                "expected number, found {}",
                other.type_name()
            ))),
        }
    }

    /// Follows a dotted path through nested objects.
    pub fn lookup(&self, path: &[String]) -> Result<&Value, ExpressionError> {
        path.iter().try_fold(self, |value, segment| match value {
            Value::Object(fields) => fields
                .get(segment)
                .ok_or_else(|| ExpressionError::UnknownVariable(path.join("."))),
            _ => Err(ExpressionError::UnknownVariable(path.join("."))),
        })
    }

    /// Equality across types is false. Hex strings compare case-insensitively.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) if a.starts_with("0x") && b.starts_with("0x") => {
                a.eq_ignore_ascii_case(b)
            }
            (a, b) => a == b,
        }
    }

    pub fn compare(&self, other: &Value) -> Result<Ordering, ExpressionError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (a, b) => Err(ExpressionError::TypeMismatch(format!(
                "cannot order {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Object(fields) => write!(f, "{{{} fields}}", fields.len()),
        }
    }
}

impl From<DynSolValue> for Value {
    fn from(value: DynSolValue) -> Self {
        match value {
            DynSolValue::Bool(b) => Value::Bool(b),
            DynSolValue::Uint(n, _) => Value::Number(n),
            DynSolValue::Int(n, _) if !n.is_negative() => Value::Number(n.into_raw()),
            DynSolValue::Int(n, _) => Value::Str(n.to_string()),
            DynSolValue::Address(address) => Value::Str(address.to_string()),
            DynSolValue::FixedBytes(word, size) => Value::Str(hex::encode_prefixed(&word[..size])),
            DynSolValue::Bytes(bytes) => Value::Str(hex::encode_prefixed(bytes)),
            DynSolValue::String(s) => Value::Str(s),
            DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            other => Value::Str(hex::encode_prefixed(other.abi_encode())),
        }
    }
}
