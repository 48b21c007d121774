//! Message Repository Module
//!
//! The message store is the single source of truth shared by every processor loop. Rows
//! are keyed by (message hash, direction); all writes are row-atomic and idempotent so
//! concurrently running processors can race on the same message without corrupting it.
//!
//! ## Repository Implementations
//!
//! - [`InMemoryMessageRepository`]: process-local storage for development and tests
//! - [`RedisMessageRepository`]: Redis-backed storage for production environments
//!
//! [`NotifyingMessageRepository`] decorates either of them with a status hook.
mod message_in_memory;
mod message_redis;
mod notifying;

pub use message_in_memory::*;
pub use message_redis::*;
pub use notifying::*;

use std::{cmp::Ordering, collections::HashMap, future::Future, sync::Arc};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error};
use redis::aio::ConnectionManager;

use crate::models::{
    ChainError, ClaimSubmission, Direction, Message, MessageStatus, ProcessorError, StoreError,
};

/// Selection criteria for the next message to claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimableQuery {
    pub direction: Direction,
    pub contract_address: Address,
    /// Eligible statuses, in priority order.
    pub statuses: Vec<MessageStatus>,
    /// Rows with `claim_number_of_retry >= max_retry` are skipped.
    pub max_retry: u32,
    /// Rows retried less than this many seconds ago are skipped.
    pub retry_delay_secs: u64,
    /// A `FeeUnderpriced` row is only eligible once its recorded threshold exceeds this value.
    pub min_gas_threshold: Option<U256>,
}

impl ClaimableQuery {
    fn accepts(&self, message: &Message, now: DateTime<Utc>) -> bool {
        if message.direction != self.direction
            || message.contract_address != self.contract_address
            || !self.statuses.contains(&message.status)
            || message.claim_number_of_retry >= self.max_retry
        {
            return false;
        }

        if let Some(last_retried_at) = message.claim_last_retried_at {
            if now.signed_duration_since(last_retried_at)
                < Duration::seconds(self.retry_delay_secs as i64)
            {
                return false;
            }
        }

        match (message.status, self.min_gas_threshold) {
            (MessageStatus::FeeUnderpriced, Some(min)) => message
                .claim_gas_estimation_threshold
                .is_some_and(|threshold| threshold > min),
            _ => true,
        }
    }

    fn status_rank(&self, status: MessageStatus) -> usize {
        self.statuses
            .iter()
            .position(|s| *s == status)
            .unwrap_or(usize::MAX)
    }

    /// Status order first, then most profitable, then oldest.
    fn compare(&self, a: &Message, b: &Message) -> Ordering {
        self.status_rank(a.status)
            .cmp(&self.status_rank(b.status))
            .then_with(|| {
                // `None` thresholds sort after any known threshold
                b.claim_gas_estimation_threshold
                    .cmp(&a.claim_gas_estimation_threshold)
            })
            .then_with(|| b.fee.cmp(&a.fee))
            .then_with(|| a.sent_block_number.cmp(&b.sent_block_number))
            .then_with(|| a.sent_log_index.cmp(&b.sent_log_index))
    }

    /// Picks the best candidate among `messages`, if any qualifies.
    pub fn select<'a, I>(&self, messages: I, now: DateTime<Utc>) -> Option<Message>
    where
        I: IntoIterator<Item = &'a Message>,
    {
        messages
            .into_iter()
            .filter(|m| self.accepts(m, now))
            .min_by(|a, b| self.compare(a, b))
            .cloned()
    }
}

/// Oldest first by origin position.
pub(crate) fn by_origin_position(a: &Message, b: &Message) -> Ordering {
    a.sent_block_number
        .cmp(&b.sent_block_number)
        .then_with(|| a.sent_log_index.cmp(&b.sent_log_index))
}

/// Oldest claim submission first.
pub(crate) fn by_claim_creation(a: &Message, b: &Message) -> Ordering {
    match (a.claim_tx_creation_date, b.claim_tx_creation_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.claim_tx_nonce.cmp(&b.claim_tx_nonce))
}

/// A trait defining message store operations
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Inserts the message unless a row with the same hash and direction exists.
    /// Returns whether a row was written.
    async fn insert_if_absent(&self, message: Message) -> Result<bool, StoreError>;

    /// Replaces the row identified by the message hash and direction.
    async fn update(&self, message: Message) -> Result<Message, StoreError>;

    /// Replaces several rows in one call.
    async fn update_many(&self, messages: Vec<Message>) -> Result<(), StoreError>;

    async fn find(
        &self,
        message_hash: B256,
        direction: Direction,
    ) -> Result<Option<Message>, StoreError>;

    /// Up to `limit` rows with `status`, oldest origin block first.
    async fn first_n_unprocessed(
        &self,
        status: MessageStatus,
        direction: Direction,
        limit: usize,
        contract_address: Address,
    ) -> Result<Vec<Message>, StoreError>;

    async fn next_claimable(&self, query: ClaimableQuery) -> Result<Option<Message>, StoreError>;

    /// Highest claim transaction nonce ever recorded for the direction.
    async fn last_claim_tx_nonce(&self, direction: Direction) -> Result<Option<u64>, StoreError>;

    async fn first_pending(&self, direction: Direction) -> Result<Option<Message>, StoreError>;

    /// Row with the highest origin position, used to resume log scanning.
    async fn latest_recorded(
        &self,
        direction: Direction,
        contract_address: Address,
    ) -> Result<Option<Message>, StoreError>;

    async fn count_by_status(
        &self,
        direction: Direction,
    ) -> Result<HashMap<MessageStatus, usize>, StoreError>;

    /// Deletes rows in one of `statuses` last updated more than `age` ago.
    async fn delete_older_than(
        &self,
        age: Duration,
        statuses: &[MessageStatus],
    ) -> Result<usize, StoreError>;

    /// Records a claim in two writes around the submission future.
    ///
    /// The first write marks the row `Pending` with `nonce` before `submission` resolves, so
    /// a crash after broadcast never leaves the nonce unrecorded. It also drops the hash of any
    /// earlier attempt, so readers never follow a stale transaction. The second write stores the
    /// transaction fields. A failed submission restores the row as it was before the call.
    async fn update_with_claim_submission<F>(
        &self,
        message: Message,
        nonce: u64,
        submission: F,
    ) -> Result<(Message, ClaimSubmission), ProcessorError>
    where
        F: Future<Output = Result<ClaimSubmission, ChainError>> + Send,
    {
        let snapshot = message.clone();
        let now = Utc::now();

        let mut pending = message;
        pending.status = MessageStatus::Pending;
        pending.clear_claim_result();
        pending.claim_tx_nonce = Some(nonce);
        pending.claim_tx_creation_date = Some(now);
        pending.updated_at = now;
        let mut pending = self.update(pending).await?;

        debug!(
            "Claim recorded as pending before broadcast: messageHash={} nonce={}",
            pending.message_hash, nonce
        );

        match submission.await {
            Ok(submitted) => {
                pending.claim_tx_hash = Some(submitted.tx_hash);
                pending.claim_tx_gas_limit = Some(submitted.gas_limit);
                pending.claim_tx_max_fee_per_gas = Some(submitted.max_fee_per_gas);
                pending.claim_tx_max_priority_fee_per_gas =
                    Some(submitted.max_priority_fee_per_gas);
                pending.updated_at = Utc::now();
                let saved = self.update(pending).await?;
                Ok((saved, submitted))
            }
            Err(e) => {
                if let Err(restore_err) = self.update(snapshot).await {
                    error!(
                        "Failed to restore message after rejected claim: messageHash={} error={}",
                        pending.message_hash, restore_err
                    );
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mockall::mock! {
    pub MessageRepository {}

    #[async_trait]
    impl MessageRepository for MessageRepository {
        async fn insert_if_absent(&self, message: Message) -> Result<bool, StoreError>;
        async fn update(&self, message: Message) -> Result<Message, StoreError>;
        async fn update_many(&self, messages: Vec<Message>) -> Result<(), StoreError>;
        async fn find(&self, message_hash: B256, direction: Direction) -> Result<Option<Message>, StoreError>;
        async fn first_n_unprocessed(&self, status: MessageStatus, direction: Direction, limit: usize, contract_address: Address) -> Result<Vec<Message>, StoreError>;
        async fn next_claimable(&self, query: ClaimableQuery) -> Result<Option<Message>, StoreError>;
        async fn last_claim_tx_nonce(&self, direction: Direction) -> Result<Option<u64>, StoreError>;
        async fn first_pending(&self, direction: Direction) -> Result<Option<Message>, StoreError>;
        async fn latest_recorded(&self, direction: Direction, contract_address: Address) -> Result<Option<Message>, StoreError>;
        async fn count_by_status(&self, direction: Direction) -> Result<HashMap<MessageStatus, usize>, StoreError>;
        async fn delete_older_than(&self, age: Duration, statuses: &[MessageStatus]) -> Result<usize, StoreError>;
    }
}

/// Enum wrapper for different message repository implementations
#[derive(Debug, Clone)]
pub enum MessageRepositoryStorage {
    InMemory(InMemoryMessageRepository),
    Redis(RedisMessageRepository),
}

impl MessageRepositoryStorage {
    pub fn new_in_memory() -> Self {
        Self::InMemory(InMemoryMessageRepository::new())
    }

    pub fn new_redis(
        connection_manager: Arc<ConnectionManager>,
        key_prefix: String,
    ) -> Result<Self, StoreError> {
        Ok(Self::Redis(RedisMessageRepository::new(
            connection_manager,
            key_prefix,
        )?))
    }
}

#[async_trait]
impl MessageRepository for MessageRepositoryStorage {
    async fn insert_if_absent(&self, message: Message) -> Result<bool, StoreError> {
        match self {
            Self::InMemory(repo) => repo.insert_if_absent(message).await,
            Self::Redis(repo) => repo.insert_if_absent(message).await,
        }
    }

    async fn update(&self, message: Message) -> Result<Message, StoreError> {
        match self {
            Self::InMemory(repo) => repo.update(message).await,
            Self::Redis(repo) => repo.update(message).await,
        }
    }

    async fn update_many(&self, messages: Vec<Message>) -> Result<(), StoreError> {
        match self {
            Self::InMemory(repo) => repo.update_many(messages).await,
            Self::Redis(repo) => repo.update_many(messages).await,
        }
    }

    async fn find(
        &self,
        message_hash: B256,
        direction: Direction,
    ) -> Result<Option<Message>, StoreError> {
        match self {
            Self::InMemory(repo) => repo.find(message_hash, direction).await,
            Self::Redis(repo) => repo.find(message_hash, direction).await,
        }
    }

    async fn first_n_unprocessed(
        &self,
        status: MessageStatus,
        direction: Direction,
        limit: usize,
        contract_address: Address,
    ) -> Result<Vec<Message>, StoreError> {
        match self {
            Self::InMemory(repo) => {
                repo.first_n_unprocessed(status, direction, limit, contract_address)
                    .await
            }
            Self::Redis(repo) => {
                repo.first_n_unprocessed(status, direction, limit, contract_address)
                    .await
            }
        }
    }

    async fn next_claimable(&self, query: ClaimableQuery) -> Result<Option<Message>, StoreError> {
        match self {
            Self::InMemory(repo) => repo.next_claimable(query).await,
            Self::Redis(repo) => repo.next_claimable(query).await,
        }
    }

    async fn last_claim_tx_nonce(&self, direction: Direction) -> Result<Option<u64>, StoreError> {
        match self {
            Self::InMemory(repo) => repo.last_claim_tx_nonce(direction).await,
            Self::Redis(repo) => repo.last_claim_tx_nonce(direction).await,
        }
    }

    async fn first_pending(&self, direction: Direction) -> Result<Option<Message>, StoreError> {
        match self {
            Self::InMemory(repo) => repo.first_pending(direction).await,
            Self::Redis(repo) => repo.first_pending(direction).await,
        }
    }

    async fn latest_recorded(
        &self,
        direction: Direction,
        contract_address: Address,
    ) -> Result<Option<Message>, StoreError> {
        match self {
            Self::InMemory(repo) => repo.latest_recorded(direction, contract_address).await,
            Self::Redis(repo) => repo.latest_recorded(direction, contract_address).await,
        }
    }

    async fn count_by_status(
        &self,
        direction: Direction,
    ) -> Result<HashMap<MessageStatus, usize>, StoreError> {
        match self {
            Self::InMemory(repo) => repo.count_by_status(direction).await,
            Self::Redis(repo) => repo.count_by_status(direction).await,
        }
    }

    async fn delete_older_than(
        &self,
        age: Duration,
        statuses: &[MessageStatus],
    ) -> Result<usize, StoreError> {
        match self {
            Self::InMemory(repo) => repo.delete_older_than(age, statuses).await,
            Self::Redis(repo) => repo.delete_older_than(age, statuses).await,
        }
    }
}
