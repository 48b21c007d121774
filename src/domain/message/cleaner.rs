//! Periodic removal of settled messages.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use log::info;

use super::MessageProcessor;
use crate::{
    models::{ProcessorError, TERMINAL_MESSAGE_STATUSES},
    repositories::MessageRepository,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCleanerConfig {
    pub enabled: bool,
    pub cleaning_interval_ms: u64,
    pub days_before_now_to_delete: u64,
}

/// Deletes messages in a terminal status not updated for the configured number of days.
pub struct DatabaseCleaner<R: MessageRepository> {
    repository: Arc<R>,
    config: DatabaseCleanerConfig,
}

impl<R: MessageRepository> DatabaseCleaner<R> {
    pub fn new(repository: Arc<R>, config: DatabaseCleanerConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &DatabaseCleanerConfig {
        &self.config
    }
}

#[async_trait]
impl<R: MessageRepository + 'static> MessageProcessor for DatabaseCleaner<R> {
    fn name(&self) -> &'static str {
        "database-cleaner"
    }

    async fn process(&self) -> Result<(), ProcessorError> {
        let age = Duration::days(self.config.days_before_now_to_delete as i64);
        let deleted = self
            .repository
            .delete_older_than(age, TERMINAL_MESSAGE_STATUSES)
            .await?;
        info!(
            "Database cleanup completed: deletedMessages={} daysBeforeNow={}",
            deleted, self.config.days_before_now_to_delete
        );
        Ok(())
    }
}
