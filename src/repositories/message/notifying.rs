//! Status hook around a message store.
use std::{collections::HashMap, sync::Arc};

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::Duration;
use strum::IntoEnumIterator;

#[cfg(test)]
use mockall::automock;

use super::{ClaimableQuery, MessageRepository};
use crate::models::{Direction, Message, MessageStatus, StoreError};

/// Observer of successful store writes.
#[cfg_attr(test, automock)]
pub trait MessageStatusListener: Send + Sync {
    /// Called once per written row. `previous` is `None` for a fresh insert.
    fn on_status_change(&self, message: &Message, previous: Option<MessageStatus>);

    /// Called with the full per-status row count of a direction after bulk changes.
    fn on_counts_refreshed(&self, direction: Direction, counts: &HashMap<MessageStatus, usize>);
}

/// Message store decorator invoking a [`MessageStatusListener`] after every write.
#[derive(Clone)]
pub struct NotifyingMessageRepository<R> {
    inner: R,
    listener: Arc<dyn MessageStatusListener>,
}

impl<R: MessageRepository> NotifyingMessageRepository<R> {
    pub fn new(inner: R, listener: Arc<dyn MessageStatusListener>) -> Self {
        Self { inner, listener }
    }

    async fn previous_status(&self, message: &Message) -> Option<MessageStatus> {
        // A failed lookup only degrades the metric; the write itself must go through.
        self.inner
            .find(message.message_hash, message.direction)
            .await
            .ok()
            .flatten()
            .map(|m| m.status)
    }

    /// Pushes current per-status counts of every direction to the listener.
    pub async fn refresh_counts(&self) -> Result<(), StoreError> {
        for direction in Direction::iter() {
            let counts = self.inner.count_by_status(direction).await?;
            self.listener.on_counts_refreshed(direction, &counts);
        }
        Ok(())
    }
}

#[async_trait]
impl<R: MessageRepository> MessageRepository for NotifyingMessageRepository<R> {
    async fn insert_if_absent(&self, message: Message) -> Result<bool, StoreError> {
        let inserted = self.inner.insert_if_absent(message.clone()).await?;
        if inserted {
            self.listener.on_status_change(&message, None);
        }
        Ok(inserted)
    }

    async fn update(&self, message: Message) -> Result<Message, StoreError> {
        let previous = self.previous_status(&message).await;
        let saved = self.inner.update(message).await?;
        self.listener.on_status_change(&saved, previous);
        Ok(saved)
    }

    async fn update_many(&self, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut previous = Vec::with_capacity(messages.len());
        for message in &messages {
            previous.push(self.previous_status(message).await);
        }
        self.inner.update_many(messages.clone()).await?;
        for (message, previous) in messages.iter().zip(previous) {
            self.listener.on_status_change(message, previous);
        }
        Ok(())
    }

    async fn find(
        &self,
        message_hash: B256,
        direction: Direction,
    ) -> Result<Option<Message>, StoreError> {
        self.inner.find(message_hash, direction).await
    }

    async fn first_n_unprocessed(
        &self,
        status: MessageStatus,
        direction: Direction,
        limit: usize,
        contract_address: Address,
    ) -> Result<Vec<Message>, StoreError> {
        self.inner
            .first_n_unprocessed(status, direction, limit, contract_address)
            .await
    }

    async fn next_claimable(&self, query: ClaimableQuery) -> Result<Option<Message>, StoreError> {
        self.inner.next_claimable(query).await
    }

    async fn last_claim_tx_nonce(&self, direction: Direction) -> Result<Option<u64>, StoreError> {
        self.inner.last_claim_tx_nonce(direction).await
    }

    async fn first_pending(&self, direction: Direction) -> Result<Option<Message>, StoreError> {
        self.inner.first_pending(direction).await
    }

    async fn latest_recorded(
        &self,
        direction: Direction,
        contract_address: Address,
    ) -> Result<Option<Message>, StoreError> {
        self.inner.latest_recorded(direction, contract_address).await
    }

    async fn count_by_status(
        &self,
        direction: Direction,
    ) -> Result<HashMap<MessageStatus, usize>, StoreError> {
        self.inner.count_by_status(direction).await
    }

    async fn delete_older_than(
        &self,
        age: Duration,
        statuses: &[MessageStatus],
    ) -> Result<usize, StoreError> {
        let deleted = self.inner.delete_older_than(age, statuses).await?;
        if deleted > 0 {
            self.refresh_counts().await?;
        }
        Ok(deleted)
    }
}
