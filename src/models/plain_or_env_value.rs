//! Configuration values given either inline ("plain") or by environment variable name ("env").
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use super::SecretString;

#[derive(Error, Debug, PartialEq)]
pub enum PlainOrEnvValueError {
    #[error("Missing env var: {0}")]
    MissingEnvVar(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlainOrEnvValue {
    Env { value: String },
    Plain { value: SecretString },
}

impl PlainOrEnvValue {
    pub fn get_value(&self) -> Result<SecretString, PlainOrEnvValueError> {
        match self {
            PlainOrEnvValue::Env { value } => {
                let value = Zeroizing::new(std::env::var(value).map_err(|_| {
                    PlainOrEnvValueError::MissingEnvVar(format!(
                        "Environment variable {} not found",
                        value
                    ))
                })?);
                Ok(SecretString::new(&value))
            }
            PlainOrEnvValue::Plain { value } => Ok(value.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.get_value().map(|v| v.is_empty()).unwrap_or(true)
    }
}
