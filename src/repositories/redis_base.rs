//! Serialization and error mapping shared by the Redis-backed stores.

use crate::models::{StoreError, StoreErrorKind};
use log::{error, warn};
use redis::RedisError;
use serde::{Deserialize, Serialize};

pub trait RedisRepository {
    fn serialize_entity<T>(
        &self,
        entity: &T,
        entity_id: &str,
        operation: &'static str,
    ) -> Result<String, StoreError>
    where
        T: Serialize,
    {
        serde_json::to_string(entity).map_err(|e| {
            error!("Serialization failed for {}: {}", entity_id, e);
            StoreError::new(
                operation,
                StoreErrorKind::InvalidData(format!("Failed to serialize {}: {}", entity_id, e)),
            )
        })
    }

    fn deserialize_entity<T>(
        &self,
        json: &str,
        entity_id: &str,
        operation: &'static str,
    ) -> Result<T, StoreError>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_str(json).map_err(|e| {
            error!("Deserialization failed for {}: {}", entity_id, e);
            StoreError::new(
                operation,
                StoreErrorKind::InvalidData(format!(
                    "Failed to deserialize {}: {} (JSON length: {})",
                    entity_id,
                    e,
                    json.len()
                )),
            )
        })
    }

    /// Convert Redis errors to the store error taxonomy
    fn map_redis_error(&self, error: RedisError, operation: &'static str) -> StoreError {
        warn!("Redis operation failed in '{}': {}", operation, error);

        let kind = match error.kind() {
            redis::ErrorKind::TypeError => {
                StoreErrorKind::InvalidData(format!("Redis data type error: {}", error))
            }
            redis::ErrorKind::AuthenticationFailed => {
                StoreErrorKind::ConnectionError("Redis authentication failed".to_string())
            }
            redis::ErrorKind::IoError => {
                StoreErrorKind::ConnectionError(format!("Redis I/O error: {}", error))
            }
            redis::ErrorKind::ExecAbortError => {
                StoreErrorKind::LockError(format!("Redis transaction aborted: {}", error))
            }
            redis::ErrorKind::ReadOnly | redis::ErrorKind::BusyLoadingError => {
                StoreErrorKind::ConnectionError(format!("Redis unavailable: {}", error))
            }
            _ => StoreErrorKind::Unknown(format!("Redis operation failed: {}", error)),
        };
        StoreError::new(operation, kind)
    }
}
