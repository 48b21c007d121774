//! In-memory message store.
//!
//! Rows live in a `Mutex`-protected `HashMap` keyed by (message hash, direction). Clones
//! share the same map so every processor of a running instance observes the same rows.
use std::{collections::HashMap, sync::Arc};

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use itertools::Itertools;
use tokio::sync::{Mutex, MutexGuard};

use super::{by_claim_creation, by_origin_position, ClaimableQuery, MessageRepository};
use crate::models::{Direction, Message, MessageStatus, StoreError, StoreErrorKind};

type MessageMap = HashMap<(B256, Direction), Message>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageRepository {
    store: Arc<Mutex<MessageMap>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire_lock<T>(lock: &Mutex<T>) -> Result<MutexGuard<T>, StoreError> {
        Ok(lock.lock().await)
    }

    /// Rejects a `Pending` row whose nonce is already held by another pending row.
    fn check_pending_nonce(
        store: &MessageMap,
        message: &Message,
        operation: &'static str,
    ) -> Result<(), StoreError> {
        if message.status != MessageStatus::Pending {
            return Ok(());
        }
        let Some(nonce) = message.claim_tx_nonce else {
            return Ok(());
        };
        let conflict = store.values().any(|other| {
            other.direction == message.direction
                && other.message_hash != message.message_hash
                && other.status == MessageStatus::Pending
                && other.claim_tx_nonce == Some(nonce)
        });
        if conflict {
            return Err(StoreError::new(
                operation,
                StoreErrorKind::ConstraintViolation(format!(
                    "Nonce {} already held by a pending claim in direction {}",
                    nonce, message.direction
                )),
            )
            .with_message(message));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert_if_absent(&self, message: Message) -> Result<bool, StoreError> {
        let mut store = Self::acquire_lock(&self.store).await?;
        if store.contains_key(&message.key()) {
            return Ok(false);
        }
        store.insert(message.key(), message);
        Ok(true)
    }

    async fn update(&self, message: Message) -> Result<Message, StoreError> {
        let mut store = Self::acquire_lock(&self.store).await?;
        if !store.contains_key(&message.key()) {
            return Err(StoreError::new(
                "update",
                StoreErrorKind::NotFound(format!(
                    "Message {} ({}) not found",
                    message.message_hash, message.direction
                )),
            )
            .with_message(&message));
        }
        Self::check_pending_nonce(&store, &message, "update")?;
        store.insert(message.key(), message.clone());
        Ok(message)
    }

    /// All or nothing: rows are staged one by one and the batch is dropped on the first error.
    async fn update_many(&self, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut store = Self::acquire_lock(&self.store).await?;
        let mut staged = store.clone();
        for message in messages {
            if !staged.contains_key(&message.key()) {
                return Err(StoreError::new(
                    "update_many",
                    StoreErrorKind::NotFound(format!(
                        "Message {} ({}) not found",
                        message.message_hash, message.direction
                    )),
                )
                .with_message(&message));
            }
            Self::check_pending_nonce(&staged, &message, "update_many")?;
            staged.insert(message.key(), message);
        }
        *store = staged;
        Ok(())
    }

    async fn find(
        &self,
        message_hash: B256,
        direction: Direction,
    ) -> Result<Option<Message>, StoreError> {
        let store = Self::acquire_lock(&self.store).await?;
        Ok(store.get(&(message_hash, direction)).cloned())
    }

    async fn first_n_unprocessed(
        &self,
        status: MessageStatus,
        direction: Direction,
        limit: usize,
        contract_address: Address,
    ) -> Result<Vec<Message>, StoreError> {
        let store = Self::acquire_lock(&self.store).await?;
        Ok(store
            .values()
            .filter(|m| {
                m.status == status
                    && m.direction == direction
                    && m.contract_address == contract_address
            })
            .sorted_by(|a, b| by_origin_position(a, b))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn next_claimable(&self, query: ClaimableQuery) -> Result<Option<Message>, StoreError> {
        let store = Self::acquire_lock(&self.store).await?;
        Ok(query.select(store.values(), Utc::now()))
    }

    async fn last_claim_tx_nonce(&self, direction: Direction) -> Result<Option<u64>, StoreError> {
        let store = Self::acquire_lock(&self.store).await?;
        Ok(store
            .values()
            .filter(|m| m.direction == direction)
            .filter_map(|m| m.claim_tx_nonce)
            .max())
    }

    async fn first_pending(&self, direction: Direction) -> Result<Option<Message>, StoreError> {
        let store = Self::acquire_lock(&self.store).await?;
        Ok(store
            .values()
            .filter(|m| m.direction == direction && m.status == MessageStatus::Pending)
            .min_by(|a, b| by_claim_creation(a, b))
            .cloned())
    }

    async fn latest_recorded(
        &self,
        direction: Direction,
        contract_address: Address,
    ) -> Result<Option<Message>, StoreError> {
        let store = Self::acquire_lock(&self.store).await?;
        Ok(store
            .values()
            .filter(|m| m.direction == direction && m.contract_address == contract_address)
            .max_by(|a, b| by_origin_position(a, b))
            .cloned())
    }

    async fn count_by_status(
        &self,
        direction: Direction,
    ) -> Result<HashMap<MessageStatus, usize>, StoreError> {
        let store = Self::acquire_lock(&self.store).await?;
        Ok(store
            .values()
            .filter(|m| m.direction == direction)
            .counts_by(|m| m.status))
    }

    async fn delete_older_than(
        &self,
        age: Duration,
        statuses: &[MessageStatus],
    ) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - age;
        let mut store = Self::acquire_lock(&self.store).await?;
        let before = store.len();
        store.retain(|_, m| !(statuses.contains(&m.status) && m.updated_at < cutoff));
        Ok(before - store.len())
    }
}
