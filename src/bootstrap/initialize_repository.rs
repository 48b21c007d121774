//! Message store initialization
use std::{sync::Arc, time::Duration};

use eyre::{eyre, Result};
use log::{info, warn};
use tokio::time::timeout;

use crate::{
    config::{RepositoryStorageType, ServerConfig},
    metrics::MessageMetricsUpdater,
    repositories::{MessageRepositoryStorage, NotifyingMessageRepository},
};

/// Store shared by every processor: the configured backend behind the metrics hook.
pub type PostmanRepository = NotifyingMessageRepository<MessageRepositoryStorage>;

async fn initialize_storage(config: &ServerConfig) -> Result<MessageRepositoryStorage> {
    match config.storage_type {
        RepositoryStorageType::InMemory => {
            warn!("Messages are stored in memory and will be lost on restart");
            Ok(MessageRepositoryStorage::new_in_memory())
        }
        RepositoryStorageType::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| eyre!("REDIS_URL is required with the redis storage type"))?;
            let redis_client = redis::Client::open(redis_url)?;
            let connection_manager = timeout(
                Duration::from_millis(config.redis_connection_timeout_ms),
                redis::aio::ConnectionManager::new(redis_client),
            )
            .await
            .map_err(|_| {
                eyre!(
                    "Redis connection timeout after {}ms",
                    config.redis_connection_timeout_ms
                )
            })??;

            Ok(MessageRepositoryStorage::new_redis(
                Arc::new(connection_manager),
                config.redis_key_prefix.clone(),
            )?)
        }
    }
}

/// Initializes the message store and seeds the status gauges from its content.
///
/// # Errors
///
/// Returns error if:
/// - Redis is selected without a URL, or is unreachable
/// - The initial status count fails
pub async fn initialize_repository(config: &ServerConfig) -> Result<Arc<PostmanRepository>> {
    let storage = initialize_storage(config).await?;
    let repository =
        NotifyingMessageRepository::new(storage, Arc::new(MessageMetricsUpdater::new()));
    repository.refresh_counts().await?;

    info!("Message store ready: storageType={}", config.storage_type);
    Ok(Arc::new(repository))
}
