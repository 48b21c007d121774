//! Redis-backed implementation of the MessageRepository.
//!
//! Layout, all under the configured key prefix:
//! - `message:{direction}:{hash}` holds the JSON row
//! - `direction:{direction}:status:{status}` is the set of hashes in that status
//! - `direction:{direction}:sent_block` ranks hashes by origin block
//! - `direction:{direction}:claim_nonce` ranks hashes by claim transaction nonce
//! - `direction:{direction}:pending_nonce:{nonce}` names the pending row holding a nonce
//!
//! Updates run as a Lua script so concurrent writers cannot both claim a nonce or leave a
//! row indexed under two statuses.

use std::{collections::HashMap, fmt, sync::Arc};

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, error, warn};
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use strum::IntoEnumIterator;

use super::{by_claim_creation, by_origin_position, ClaimableQuery, MessageRepository};
use crate::{
    models::{Direction, Message, MessageStatus, StoreError, StoreErrorKind},
    repositories::redis_base::RedisRepository,
};

const MESSAGE_PREFIX: &str = "message";
const DIRECTION_PREFIX: &str = "direction";
const STATUS_PREFIX: &str = "status";
const SENT_BLOCK_KEY: &str = "sent_block";
const CLAIM_NONCE_KEY: &str = "claim_nonce";
const PENDING_NONCE_PREFIX: &str = "pending_nonce";

lazy_static! {
    /// KEYS: message, sent_block, claim_nonce.
    /// ARGV: row json, hash, status key prefix, new status, pending nonce key prefix,
    /// new pending nonce or "", new claim nonce or "", sent block number.
    static ref WRITE_SCRIPT: Script = Script::new(
        r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return {'NOT_FOUND'}
end
local hash = ARGV[2]
local new_pending = ARGV[6]
if new_pending ~= '' then
  local holder = redis.call('GET', ARGV[5] .. new_pending)
  if holder and holder ~= hash then
    return {'NONCE_HELD', holder}
  end
end

local old = cjson.decode(current)
local old_status = old['status']
local old_pending = ''
if old_status == 'PENDING' and type(old['claimTxNonce']) == 'number' then
  old_pending = string.format('%d', old['claimTxNonce'])
end

redis.call('SET', KEYS[1], ARGV[1])
if old_status ~= ARGV[4] then
  redis.call('SREM', ARGV[3] .. old_status, hash)
end
if old_pending ~= '' and old_pending ~= new_pending then
  redis.call('DEL', ARGV[5] .. old_pending)
end
redis.call('SADD', ARGV[3] .. ARGV[4], hash)
redis.call('ZADD', KEYS[2], ARGV[8], hash)
if ARGV[7] == '' then
  redis.call('ZREM', KEYS[3], hash)
else
  redis.call('ZADD', KEYS[3], ARGV[7], hash)
end
if new_pending ~= '' then
  redis.call('SET', ARGV[5] .. new_pending, hash)
end
return {'OK'}
"#
    );
}

#[derive(Clone)]
pub struct RedisMessageRepository {
    pub client: Arc<ConnectionManager>,
    pub key_prefix: String,
}

impl RedisRepository for RedisMessageRepository {}

impl fmt::Debug for RedisMessageRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisMessageRepository")
            .field("client", &"<ConnectionManager>")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisMessageRepository {
    pub fn new(
        connection_manager: Arc<ConnectionManager>,
        key_prefix: String,
    ) -> Result<Self, StoreError> {
        if key_prefix.is_empty() {
            return Err(StoreError::new(
                "new",
                StoreErrorKind::InvalidData("Redis key prefix cannot be empty".to_string()),
            ));
        }

        Ok(Self {
            client: connection_manager,
            key_prefix,
        })
    }

    /// message:{direction}:{hash}
    fn message_key(&self, direction: Direction, message_hash: &str) -> String {
        format!(
            "{}:{}:{}:{}",
            self.key_prefix, MESSAGE_PREFIX, direction, message_hash
        )
    }

    /// direction:{direction}:status:
    fn status_key_prefix(&self, direction: Direction) -> String {
        format!(
            "{}:{}:{}:{}:",
            self.key_prefix, DIRECTION_PREFIX, direction, STATUS_PREFIX
        )
    }

    /// direction:{direction}:status:{status}
    fn status_key(&self, direction: Direction, status: MessageStatus) -> String {
        format!("{}{}", self.status_key_prefix(direction), status)
    }

    /// direction:{direction}:sent_block
    fn sent_block_key(&self, direction: Direction) -> String {
        format!(
            "{}:{}:{}:{}",
            self.key_prefix, DIRECTION_PREFIX, direction, SENT_BLOCK_KEY
        )
    }

    /// direction:{direction}:claim_nonce
    fn claim_nonce_key(&self, direction: Direction) -> String {
        format!(
            "{}:{}:{}:{}",
            self.key_prefix, DIRECTION_PREFIX, direction, CLAIM_NONCE_KEY
        )
    }

    /// direction:{direction}:pending_nonce:
    fn pending_nonce_key_prefix(&self, direction: Direction) -> String {
        format!(
            "{}:{}:{}:{}:",
            self.key_prefix, DIRECTION_PREFIX, direction, PENDING_NONCE_PREFIX
        )
    }

    /// direction:{direction}:pending_nonce:{nonce}
    fn pending_nonce_key(&self, direction: Direction, nonce: u64) -> String {
        format!("{}{}", self.pending_nonce_key_prefix(direction), nonce)
    }

    fn pending_nonce_of(message: &Message) -> Option<u64> {
        (message.status == MessageStatus::Pending)
            .then_some(message.claim_tx_nonce)
            .flatten()
    }

    /// Loads rows by hash for one direction, skipping dangling index entries.
    async fn get_messages_by_hashes(
        &self,
        direction: Direction,
        hashes: &[String],
        operation: &'static str,
    ) -> Result<Vec<Message>, StoreError> {
        if hashes.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.client.as_ref().clone();
        let keys: Vec<String> = hashes
            .iter()
            .map(|h| self.message_key(direction, h))
            .collect();

        debug!("Batch fetching {} messages", keys.len());

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_redis_error(e, operation))?;

        let mut messages = Vec::with_capacity(values.len());
        for (hash, value) in hashes.iter().zip(values) {
            match value {
                Some(json) => messages.push(self.deserialize_entity(&json, hash, operation)?),
                None => warn!("Index references missing message {} ({})", hash, direction),
            }
        }
        Ok(messages)
    }

    async fn get_messages_by_status(
        &self,
        direction: Direction,
        status: MessageStatus,
        operation: &'static str,
    ) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.client.as_ref().clone();
        let hashes: Vec<String> = conn
            .smembers(self.status_key(direction, status))
            .await
            .map_err(|e| self.map_redis_error(e, operation))?;
        self.get_messages_by_hashes(direction, &hashes, operation)
            .await
    }

    /// Queues the indexes of a freshly inserted row on `pipe`.
    fn queue_insert(&self, pipe: &mut redis::Pipeline, message: &Message) {
        let direction = message.direction;
        let hash = message.message_hash.to_string();

        pipe.sadd(self.status_key(direction, message.status), &hash);
        pipe.zadd(
            self.sent_block_key(direction),
            &hash,
            message.sent_block_number as f64,
        );
        if let Some(nonce) = message.claim_tx_nonce {
            pipe.zadd(self.claim_nonce_key(direction), &hash, nonce as f64);
        }
        if let Some(nonce) = Self::pending_nonce_of(message) {
            pipe.set(self.pending_nonce_key(direction, nonce), &hash);
        }
    }

    /// Replaces a stored row and moves its index entries in one server-side step.
    ///
    /// The indexes to leave are taken from the row currently stored, not from the caller's
    /// copy, and the pending nonce is checked in the same step.
    async fn write(&self, message: &Message, operation: &'static str) -> Result<(), StoreError> {
        let direction = message.direction;
        let hash = message.message_hash.to_string();
        let value = self.serialize_entity(message, &hash, operation)?;
        let optional = |nonce: Option<u64>| nonce.map(|n| n.to_string()).unwrap_or_default();

        let mut conn = self.client.as_ref().clone();
        let reply: Vec<String> = WRITE_SCRIPT
            .key(self.message_key(direction, &hash))
            .key(self.sent_block_key(direction))
            .key(self.claim_nonce_key(direction))
            .arg(&value)
            .arg(&hash)
            .arg(self.status_key_prefix(direction))
            .arg(message.status.to_string())
            .arg(self.pending_nonce_key_prefix(direction))
            .arg(optional(Self::pending_nonce_of(message)))
            .arg(optional(message.claim_tx_nonce))
            .arg(message.sent_block_number)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Write script failed for message {}: {}", hash, e);
                self.map_redis_error(e, operation).with_message(message)
            })?;

        match reply.as_slice() {
            [ok] if ok == "OK" => Ok(()),
            [missing] if missing == "NOT_FOUND" => Err(StoreError::new(
                operation,
                StoreErrorKind::NotFound(format!("Message {} ({}) not found", hash, direction)),
            )
            .with_message(message)),
            [held, holder] if held == "NONCE_HELD" => Err(StoreError::new(
                operation,
                StoreErrorKind::ConstraintViolation(format!(
                    "Nonce {:?} already held by pending message {} in direction {}",
                    message.claim_tx_nonce, holder, direction
                )),
            )
            .with_message(message)),
            other => Err(StoreError::new(
                operation,
                StoreErrorKind::InvalidData(format!("Unexpected write reply: {:?}", other)),
            )
            .with_message(message)),
        }
    }
}

#[async_trait]
impl MessageRepository for RedisMessageRepository {
    async fn insert_if_absent(&self, message: Message) -> Result<bool, StoreError> {
        let hash = message.message_hash.to_string();
        let key = self.message_key(message.direction, &hash);
        let value = self.serialize_entity(&message, &hash, "insert_if_absent")?;
        let mut conn = self.client.as_ref().clone();

        let inserted: bool = conn.set_nx(&key, &value).await.map_err(|e| {
            self.map_redis_error(e, "insert_if_absent")
                .with_message(&message)
        })?;

        if !inserted {
            debug!("Message {} ({}) already stored", hash, message.direction);
            return Ok(false);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        self.queue_insert(&mut pipe, &message);
        pipe.exec_async(&mut conn).await.map_err(|e| {
            error!("Index pipeline failed for new message {}: {}", hash, e);
            self.map_redis_error(e, "insert_if_absent")
                .with_message(&message)
        })?;

        debug!("Stored message {} ({})", hash, message.direction);
        Ok(true)
    }

    async fn update(&self, message: Message) -> Result<Message, StoreError> {
        self.write(&message, "update").await?;
        Ok(message)
    }

    async fn update_many(&self, messages: Vec<Message>) -> Result<(), StoreError> {
        for message in &messages {
            self.write(message, "update_many").await?;
        }
        Ok(())
    }

    async fn find(
        &self,
        message_hash: B256,
        direction: Direction,
    ) -> Result<Option<Message>, StoreError> {
        let hash = message_hash.to_string();
        let mut conn = self.client.as_ref().clone();
        let value: Option<String> = conn
            .get(self.message_key(direction, &hash))
            .await
            .map_err(|e| self.map_redis_error(e, "find"))?;

        value
            .map(|json| self.deserialize_entity(&json, &hash, "find"))
            .transpose()
    }

    async fn first_n_unprocessed(
        &self,
        status: MessageStatus,
        direction: Direction,
        limit: usize,
        contract_address: Address,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = self
            .get_messages_by_status(direction, status, "first_n_unprocessed")
            .await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.contract_address == contract_address && m.status == status)
            .sorted_by(by_origin_position)
            .take(limit)
            .collect())
    }

    async fn next_claimable(&self, query: ClaimableQuery) -> Result<Option<Message>, StoreError> {
        let mut candidates = Vec::new();
        for status in &query.statuses {
            candidates.extend(
                self.get_messages_by_status(query.direction, *status, "next_claimable")
                    .await?,
            );
        }
        Ok(query.select(&candidates, Utc::now()))
    }

    async fn last_claim_tx_nonce(&self, direction: Direction) -> Result<Option<u64>, StoreError> {
        let mut conn = self.client.as_ref().clone();
        let top: Vec<(String, f64)> = conn
            .zrevrange_withscores(self.claim_nonce_key(direction), 0, 0)
            .await
            .map_err(|e| self.map_redis_error(e, "last_claim_tx_nonce"))?;
        Ok(top.first().map(|(_, score)| *score as u64))
    }

    async fn first_pending(&self, direction: Direction) -> Result<Option<Message>, StoreError> {
        let pending = self
            .get_messages_by_status(direction, MessageStatus::Pending, "first_pending")
            .await?;
        Ok(pending.into_iter().min_by(by_claim_creation))
    }

    async fn latest_recorded(
        &self,
        direction: Direction,
        contract_address: Address,
    ) -> Result<Option<Message>, StoreError> {
        let mut conn = self.client.as_ref().clone();
        let top: Vec<(String, f64)> = conn
            .zrevrange_withscores(self.sent_block_key(direction), 0, 0)
            .await
            .map_err(|e| self.map_redis_error(e, "latest_recorded"))?;
        let Some((_, score)) = top.first() else {
            return Ok(None);
        };

        let hashes: Vec<String> = conn
            .zrangebyscore(self.sent_block_key(direction), *score, *score)
            .await
            .map_err(|e| self.map_redis_error(e, "latest_recorded"))?;
        let messages = self
            .get_messages_by_hashes(direction, &hashes, "latest_recorded")
            .await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.contract_address == contract_address)
            .max_by(by_origin_position))
    }

    async fn count_by_status(
        &self,
        direction: Direction,
    ) -> Result<HashMap<MessageStatus, usize>, StoreError> {
        let mut conn = self.client.as_ref().clone();
        let mut counts = HashMap::new();
        for status in MessageStatus::iter() {
            let count: usize = conn
                .scard(self.status_key(direction, status))
                .await
                .map_err(|e| self.map_redis_error(e, "count_by_status"))?;
            if count > 0 {
                counts.insert(status, count);
            }
        }
        Ok(counts)
    }

    async fn delete_older_than(
        &self,
        age: Duration,
        statuses: &[MessageStatus],
    ) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - age;
        let mut conn = self.client.as_ref().clone();
        let mut deleted = 0;

        for direction in Direction::iter() {
            for status in statuses {
                let expired: Vec<Message> = self
                    .get_messages_by_status(direction, *status, "delete_older_than")
                    .await?
                    .into_iter()
                    .filter(|m| m.updated_at < cutoff)
                    .collect();
                if expired.is_empty() {
                    continue;
                }

                let mut pipe = redis::pipe();
                pipe.atomic();
                for message in &expired {
                    let hash = message.message_hash.to_string();
                    pipe.del(self.message_key(direction, &hash));
                    pipe.srem(self.status_key(direction, *status), &hash);
                    pipe.zrem(self.sent_block_key(direction), &hash);
                    pipe.zrem(self.claim_nonce_key(direction), &hash);
                }
                pipe.exec_async(&mut conn)
                    .await
                    .map_err(|e| self.map_redis_error(e, "delete_older_than"))?;
                deleted += expired.len();
            }
        }

        debug!("Deleted {} expired messages", deleted);
        Ok(deleted)
    }
}
