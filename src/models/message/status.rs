use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle status of a relayed message.
///
/// Rows move forward through these states. The only way back is
/// `Pending -> Sent`, taken when a claim reverted because of the protocol rate limit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Sent,
    Excluded,
    Anchored,
    TransactionSizeComputed,
    ZeroFee,
    NonExecutable,
    FeeUnderpriced,
    Pending,
    ClaimedSuccess,
    ClaimedReverted,
}

pub const TERMINAL_MESSAGE_STATUSES: &[MessageStatus] = &[
    MessageStatus::Excluded,
    MessageStatus::ZeroFee,
    MessageStatus::NonExecutable,
    MessageStatus::ClaimedSuccess,
    MessageStatus::ClaimedReverted,
];

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        TERMINAL_MESSAGE_STATUSES.contains(self)
    }
}

/// Which chain a message originates from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Direction {
    #[serde(rename = "L1_TO_L2")]
    #[strum(serialize = "L1_TO_L2")]
    L1ToL2,
    #[serde(rename = "L2_TO_L1")]
    #[strum(serialize = "L2_TO_L1")]
    L2ToL1,
}

/// Status of a message as reported by the destination message service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OnChainMessageStatus {
    Unknown,
    Claimable,
    Claimed,
}
