//! Metrics module for the application.
//!
//! - This module contains the global Prometheus registry.
//! - Defines the message lifecycle metrics, fed by the store status hook.
//! - Defines the claim transaction metrics, fed by the claiming persister.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use strum::{Display, IntoEnumIterator};

use crate::{
    models::{Direction, Message, MessageStatus, TransactionReceiptData},
    repositories::MessageStatusListener,
};

lazy_static! {
    // Global Prometheus registry.
    pub static ref REGISTRY: Registry = Registry::new();

    // Gauge: number of stored messages per status and direction.
    pub static ref MESSAGES_BY_STATUS: IntGaugeVec = {
        let opts = Opts::new("postman_messages_by_status", "Number of stored messages by status");
        let gauge_vec = IntGaugeVec::new(opts, &["status", "direction"]).unwrap();
        REGISTRY.register(Box::new(gauge_vec.clone())).unwrap();
        gauge_vec
    };

    // Counter: transitions into a terminal status.
    pub static ref TERMINAL_TRANSITIONS: IntCounterVec = {
        let opts = Opts::new(
            "postman_terminal_transitions_total",
            "Total number of messages reaching a terminal status",
        );
        let counter_vec = IntCounterVec::new(opts, &["status", "direction"]).unwrap();
        REGISTRY.register(Box::new(counter_vec.clone())).unwrap();
        counter_vec
    };

    // Counter: claims paid by the relayer.
    pub static ref SPONSORED_MESSAGES: IntCounterVec = {
        let opts = Opts::new(
            "postman_sponsored_messages_total",
            "Total number of sponsored messages successfully claimed",
        );
        let counter_vec = IntCounterVec::new(opts, &["direction"]).unwrap();
        REGISTRY.register(Box::new(counter_vec.clone())).unwrap();
        counter_vec
    };

    // Histogram: seconds from the claim being recorded to its receipt being processed.
    pub static ref CLAIM_PROCESSING_TIME: HistogramVec = {
        let opts = HistogramOpts::new(
            "postman_claim_transaction_processing_seconds",
            "Time from claim submission to receipt processing",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]);
        let histogram_vec = HistogramVec::new(opts, &["direction"]).unwrap();
        REGISTRY.register(Box::new(histogram_vec.clone())).unwrap();
        histogram_vec
    };

    // Counter: claim transactions included on chain, by outcome.
    pub static ref CLAIM_INCLUSIONS: IntCounterVec = {
        let opts = Opts::new(
            "postman_claim_transactions_included_total",
            "Total number of claim transactions included on chain",
        );
        let counter_vec = IntCounterVec::new(opts, &["direction", "outcome"]).unwrap();
        REGISTRY.register(Box::new(counter_vec.clone())).unwrap();
        counter_vec
    };

    // Counter: claim transactions resent with a higher fee.
    pub static ref CLAIM_RETRIES: IntCounterVec = {
        let opts = Opts::new(
            "postman_claim_transaction_retries_total",
            "Total number of claim transactions resent with a higher fee",
        );
        let counter_vec = IntCounterVec::new(opts, &["direction"]).unwrap();
        REGISTRY.register(Box::new(counter_vec.clone())).unwrap();
        counter_vec
    };

    // Counter: gas burnt by successful sponsored claims.
    pub static ref SPONSORED_GAS_USED: IntCounterVec = {
        let opts = Opts::new(
            "postman_sponsored_gas_used_total",
            "Total gas used by sponsored claims",
        );
        let counter_vec = IntCounterVec::new(opts, &["direction"]).unwrap();
        REGISTRY.register(Box::new(counter_vec.clone())).unwrap();
        counter_vec
    };

    // Counter: wei paid for successful sponsored claims.
    pub static ref SPONSORED_GAS_COST: CounterVec = {
        let opts = Opts::new(
            "postman_sponsored_gas_cost_wei_total",
            "Total wei paid for sponsored claims",
        );
        let counter_vec = CounterVec::new(opts, &["direction"]).unwrap();
        REGISTRY.register(Box::new(counter_vec.clone())).unwrap();
        counter_vec
    };
}

/// Gather all metrics and encode them in the Prometheus text format.
pub fn gather_metrics() -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

/// Keeps the message metrics in sync with store writes.
#[derive(Debug, Default, Clone)]
pub struct MessageMetricsUpdater;

impl MessageMetricsUpdater {
    pub fn new() -> Self {
        Self
    }
}

impl MessageStatusListener for MessageMetricsUpdater {
    fn on_status_change(&self, message: &Message, previous: Option<MessageStatus>) {
        let direction = message.direction.to_string();
        if previous == Some(message.status) {
            return;
        }

        if let Some(previous) = previous {
            MESSAGES_BY_STATUS
                .with_label_values(&[&previous.to_string(), &direction])
                .dec();
        }
        MESSAGES_BY_STATUS
            .with_label_values(&[&message.status.to_string(), &direction])
            .inc();

        if message.status.is_terminal() {
            TERMINAL_TRANSITIONS
                .with_label_values(&[&message.status.to_string(), &direction])
                .inc();
        }
        if message.status == MessageStatus::ClaimedSuccess && message.is_for_sponsorship {
            SPONSORED_MESSAGES.with_label_values(&[&direction]).inc();
        }
    }

    fn on_counts_refreshed(&self, direction: Direction, counts: &HashMap<MessageStatus, usize>) {
        let direction = direction.to_string();
        for status in MessageStatus::iter() {
            let count = counts.get(&status).copied().unwrap_or(0);
            MESSAGES_BY_STATUS
                .with_label_values(&[&status.to_string(), &direction])
                .set(count as i64);
        }
    }
}

/// How an included claim transaction settled its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ClaimOutcome {
    Success,
    Reverted,
    RateLimited,
}

/// Records claim transaction timings, retries and sponsored gas.
#[derive(Debug, Default, Clone)]
pub struct TransactionMetricsUpdater;

impl TransactionMetricsUpdater {
    pub fn new() -> Self {
        Self
    }

    pub fn on_claim_included(
        &self,
        message: &Message,
        receipt: &TransactionReceiptData,
        outcome: ClaimOutcome,
        processed_at: DateTime<Utc>,
    ) {
        let direction = message.direction.to_string();
        CLAIM_INCLUSIONS
            .with_label_values(&[&direction, &outcome.to_string()])
            .inc();

        if let Some(created) = message.claim_tx_creation_date {
            let elapsed = (processed_at - created).num_milliseconds();
            if elapsed >= 0 {
                CLAIM_PROCESSING_TIME
                    .with_label_values(&[&direction])
                    .observe(elapsed as f64 / 1000.0);
            }
        }

        if outcome == ClaimOutcome::Success && message.is_for_sponsorship {
            SPONSORED_GAS_USED
                .with_label_values(&[&direction])
                .inc_by(receipt.gas_used);
            SPONSORED_GAS_COST
                .with_label_values(&[&direction])
                .inc_by(receipt.gas_used as f64 * receipt.effective_gas_price as f64);
        }
    }

    pub fn on_claim_retried(&self, direction: Direction) {
        CLAIM_RETRIES
            .with_label_values(&[&direction.to_string()])
            .inc();
    }
}
