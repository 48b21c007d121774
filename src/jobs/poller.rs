use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{error, info};
use tokio::task::JoinHandle;

use crate::{domain::MessageProcessor, models::Direction};

/// Upper bound of a single sleep, so a cleared flag is noticed quickly.
const SHUTDOWN_CHECK_STEP: Duration = Duration::from_millis(250);

/// Sleeps for `interval`, returning early once `running` is cleared.
pub async fn sleep_while_running(interval: Duration, running: &AtomicBool) {
    let mut slept = Duration::ZERO;
    while slept < interval && running.load(Ordering::Relaxed) {
        let step = SHUTDOWN_CHECK_STEP.min(interval - slept);
        tokio::time::sleep(step).await;
        slept += step;
    }
}

/// Runs a [`MessageProcessor`] on a fixed interval.
pub struct Poller {
    /// Direction the processor serves, `ALL` for store-wide maintenance.
    scope: String,
    processor: Arc<dyn MessageProcessor>,
    interval: Duration,
}

impl Poller {
    pub fn new(direction: Direction, processor: Arc<dyn MessageProcessor>, interval_ms: u64) -> Self {
        Self::with_scope(direction.to_string(), processor, interval_ms)
    }

    /// Poller for a processor that is not bound to one direction.
    pub fn unscoped(processor: Arc<dyn MessageProcessor>, interval_ms: u64) -> Self {
        Self::with_scope("ALL".to_string(), processor, interval_ms)
    }

    fn with_scope(scope: String, processor: Arc<dyn MessageProcessor>, interval_ms: u64) -> Self {
        Self {
            scope,
            processor,
            interval: Duration::from_millis(interval_ms.max(1)),
        }
    }

    pub fn start(self, running: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let name = self.processor.name();
            info!(
                "Starting poller: direction={} processor={} intervalMs={}",
                self.scope,
                name,
                self.interval.as_millis()
            );

            while running.load(Ordering::Relaxed) {
                if let Err(e) = self.processor.process().await {
                    error!(
                        "Error processing message: direction={} processor={} error={}",
                        self.scope, name, e
                    );
                }
                sleep_while_running(self.interval, &running).await;
            }

            info!(
                "Poller stopped: direction={} processor={}",
                self.scope, name
            );
        })
    }
}
