//! Store writes flowing into the Prometheus registry.
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, Bytes, U256};
use chrono::{Duration, Utc};
use postman_relayer::{
    metrics::{
        gather_metrics, ClaimOutcome, MessageMetricsUpdater, TransactionMetricsUpdater,
        CLAIM_INCLUSIONS, CLAIM_PROCESSING_TIME, CLAIM_RETRIES, MESSAGES_BY_STATUS,
        SPONSORED_GAS_COST, SPONSORED_GAS_USED, TERMINAL_TRANSITIONS,
    },
    models::{Direction, Message, MessageSentEvent, MessageStatus, TransactionReceiptData},
    repositories::{InMemoryMessageRepository, MessageRepository, NotifyingMessageRepository},
};

fn message(nonce: u64) -> Message {
    let event = MessageSentEvent {
        message_sender: Address::repeat_byte(0x11),
        destination: Address::repeat_byte(0x22),
        fee: U256::from(1_000u64),
        value: U256::ZERO,
        message_nonce: U256::from(nonce),
        calldata: Bytes::new(),
        message_hash: keccak256(nonce.to_be_bytes()),
        contract_address: Address::repeat_byte(0x33),
        block_number: nonce,
        log_index: 0,
        transaction_hash: keccak256((nonce + 1).to_be_bytes()),
    };
    Message::from_event(&event, Direction::L2ToL1, MessageStatus::Sent)
}

fn gauge(status: MessageStatus) -> i64 {
    MESSAGES_BY_STATUS
        .with_label_values(&[&status.to_string(), "L2_TO_L1"])
        .get()
}

#[tokio::test]
async fn test_store_writes_move_the_status_gauges() {
    let repository = NotifyingMessageRepository::new(
        InMemoryMessageRepository::new(),
        Arc::new(MessageMetricsUpdater::new()),
    );
    repository.refresh_counts().await.unwrap();
    assert_eq!(gauge(MessageStatus::Sent), 0);

    for nonce in 1..=3 {
        assert!(repository.insert_if_absent(message(nonce)).await.unwrap());
    }
    // Duplicates are not counted twice.
    assert!(!repository.insert_if_absent(message(1)).await.unwrap());
    assert_eq!(gauge(MessageStatus::Sent), 3);

    let mut excluded = message(2);
    excluded.set_status(MessageStatus::Excluded);
    let terminal_before = TERMINAL_TRANSITIONS
        .with_label_values(&["EXCLUDED", "L2_TO_L1"])
        .get();
    repository.update(excluded).await.unwrap();

    assert_eq!(gauge(MessageStatus::Sent), 2);
    assert_eq!(gauge(MessageStatus::Excluded), 1);
    assert_eq!(
        TERMINAL_TRANSITIONS
            .with_label_values(&["EXCLUDED", "L2_TO_L1"])
            .get(),
        terminal_before + 1
    );

    let rendered = String::from_utf8(gather_metrics().unwrap()).unwrap();
    assert!(rendered.contains("postman_messages_by_status"));
    assert!(rendered.contains("postman_terminal_transitions_total"));
}

#[test]
fn test_claim_transactions_feed_timing_retry_and_sponsorship_metrics() {
    let updater = TransactionMetricsUpdater::new();
    let mut message = message(40);
    message.direction = Direction::L1ToL2;
    message.is_for_sponsorship = true;
    let created = Utc::now() - Duration::seconds(90);
    message.claim_tx_creation_date = Some(created);
    message.claim_tx_hash = Some(keccak256(b"claim"));

    let receipt = TransactionReceiptData {
        transaction_hash: keccak256(b"claim"),
        success: true,
        gas_used: 70_000,
        effective_gas_price: 3_000_000_000,
        block_number: Some(500),
    };

    let processing = CLAIM_PROCESSING_TIME.with_label_values(&["L1_TO_L2"]);
    let samples_before = processing.get_sample_count();
    let sum_before = processing.get_sample_sum();
    let retries_before = CLAIM_RETRIES.with_label_values(&["L1_TO_L2"]).get();
    let success_before = CLAIM_INCLUSIONS
        .with_label_values(&["L1_TO_L2", "success"])
        .get();
    let gas_before = SPONSORED_GAS_USED.with_label_values(&["L1_TO_L2"]).get();
    let cost_before = SPONSORED_GAS_COST.with_label_values(&["L1_TO_L2"]).get();

    updater.on_claim_retried(Direction::L1ToL2);
    updater.on_claim_included(&message, &receipt, ClaimOutcome::Success, created + Duration::seconds(90));

    assert_eq!(CLAIM_RETRIES.with_label_values(&["L1_TO_L2"]).get(), retries_before + 1);
    assert_eq!(
        CLAIM_INCLUSIONS
            .with_label_values(&["L1_TO_L2", "success"])
            .get(),
        success_before + 1
    );
    assert_eq!(processing.get_sample_count(), samples_before + 1);
    assert!((processing.get_sample_sum() - sum_before - 90.0).abs() < 1e-6);
    assert_eq!(
        SPONSORED_GAS_USED.with_label_values(&["L1_TO_L2"]).get(),
        gas_before + 70_000
    );
    assert_eq!(
        SPONSORED_GAS_COST.with_label_values(&["L1_TO_L2"]).get(),
        cost_before + 210_000_000_000_000.0
    );

    let rendered = String::from_utf8(gather_metrics().unwrap()).unwrap();
    assert!(rendered.contains("postman_claim_transaction_processing_seconds"));
    assert!(rendered.contains("postman_claim_transaction_retries_total"));
    assert!(rendered.contains("postman_sponsored_gas_cost_wei_total"));
}
