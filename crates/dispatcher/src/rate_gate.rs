//! RateGate - minimum interval between the start of consecutive sink calls
//!
//! The check-wait-record sequence runs under one async mutex, so concurrent
//! callers are admitted one at a time and never closer than `min_interval`.

use std::time::Duration;

use contracts::CancellationToken;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, instrument, warn};

use crate::error::DispatchError;

/// Gate enforcing a minimum interval between admissions
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_admitted: Mutex<Option<Instant>>,
}

impl RateGate {
    /// Create a gate that has not admitted anything yet
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_admitted: Mutex::new(None),
        }
    }

    /// Configured minimum interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time of the most recent admission
    pub async fn last_admitted(&self) -> Option<Instant> {
        *self.last_admitted.lock().await
    }

    /// Wait until the gate opens, then record the admission.
    ///
    /// Opens immediately on first use. A cancelled wait records nothing.
    ///
    /// # Errors
    /// `Cancelled` as soon as `cancel` fires, whether queued behind another
    /// caller or sleeping.
    #[instrument(name = "rate_gate_wait", skip(self, cancel))]
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<Instant, DispatchError> {
        let mut last = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            guard = self.last_admitted.lock() => guard,
        };

        if let Some(prev) = *last {
            match prev.checked_add(self.min_interval) {
                Some(opens_at) => {
                    let now = Instant::now();
                    if now < opens_at {
                        debug!(
                            wait_ms = (opens_at - now).as_millis() as u64,
                            "Rate gate closed, waiting"
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                            _ = sleep_until(opens_at) => {}
                        }
                    }
                }
                None => {
                    // Interval past the clock's range: the gate never reopens
                    warn!(
                        min_interval_secs = self.min_interval.as_secs(),
                        "Rate gate interval out of range, waiting for cancellation"
                    );
                    cancel.cancelled().await;
                    return Err(DispatchError::Cancelled);
                }
            }
        }

        let admitted_at = Instant::now();
        *last = Some(admitted_at);
        debug!("Rate gate admitted call");
        Ok(admitted_at)
    }
}
