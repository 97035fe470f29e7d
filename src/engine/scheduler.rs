//! Maturity scheduler: a single periodic task that settles due positions.
//!
//! It never touches position fields itself. Every settlement goes through
//! [`PositionLifecycle::settle_at_maturity`], so a second scheduler (or a
//! manual settle racing this one) cannot credit a position twice.

use super::{CloseOutcome, Clock, EngineError, PositionLifecycle};
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Poll period while nothing is close to maturing.
    pub coarse_interval: Duration,
    /// Poll period once some position is within `fine_threshold` of maturing.
    pub fine_interval: Duration,
    pub fine_threshold: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            coarse_interval: Duration::from_secs(60),
            fine_interval: Duration::from_secs(10),
            fine_threshold: Duration::from_secs(3600),
        }
    }
}

/// What one pass over the active positions did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Active fixed-duration positions looked at.
    pub examined: usize,
    pub settled: usize,
    /// Due positions some other caller closed first.
    pub already_closed: usize,
    /// Due positions whose settlement failed; they stay active for the next tick.
    pub failed: usize,
    pub next_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct MaturityScheduler {
    store: Arc<dyn Store>,
    lifecycle: PositionLifecycle,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl MaturityScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: PositionLifecycle,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            lifecycle,
            clock,
            config,
        }
    }

    /// One pass: settle everything due and work out when to look again.
    ///
    /// A failure on one position is logged and counted; the rest of the pass
    /// continues. Only a failure to list positions aborts the tick.
    pub async fn tick(&self) -> Result<TickReport, EngineError> {
        let positions = self.store.list_active_positions().await?;
        let now = self.clock.now();
        let mut report = TickReport::default();
        let mut nearest_remaining_ms: Option<i64> = None;

        for position in positions.iter().filter(|p| p.is_fixed_duration()) {
            report.examined += 1;

            if !position.is_due(now) {
                let remaining = super::time_remaining_ms(position, now).unwrap_or(i64::MAX);
                nearest_remaining_ms = Some(match nearest_remaining_ms {
                    Some(current) => current.min(remaining),
                    None => remaining,
                });
                continue;
            }

            match self.lifecycle.settle_at_maturity(&position.id).await {
                Ok(CloseOutcome::Closed { .. }) => report.settled += 1,
                Ok(CloseOutcome::AlreadyClosed(status)) => {
                    debug!(position_id = %position.id, status = %status, "Position already settled elsewhere");
                    report.already_closed += 1;
                }
                Err(e) => {
                    warn!(position_id = %position.id, error = %e, "Settlement failed, will retry next tick");
                    report.failed += 1;
                }
            }
        }

        report.next_delay = self.next_delay(nearest_remaining_ms, report.failed > 0);

        if report.settled > 0 || report.failed > 0 {
            info!(
                examined = report.examined,
                settled = report.settled,
                already_closed = report.already_closed,
                failed = report.failed,
                next_delay_secs = report.next_delay.as_secs(),
                "Maturity tick"
            );
        } else {
            debug!(
                examined = report.examined,
                next_delay_secs = report.next_delay.as_secs(),
                "Maturity tick, nothing due"
            );
        }
        Ok(report)
    }

    /// Fine polling once a position is within the threshold or a settlement
    /// needs retrying, coarse otherwise.
    pub fn next_delay(&self, nearest_remaining_ms: Option<i64>, retry_pending: bool) -> Duration {
        let threshold_ms = i64::try_from(self.config.fine_threshold.as_millis()).unwrap_or(i64::MAX);
        let near = nearest_remaining_ms.is_some_and(|ms| ms <= threshold_ms);
        if near || retry_pending {
            self.config.fine_interval
        } else {
            self.config.coarse_interval
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            coarse_secs = self.config.coarse_interval.as_secs(),
            fine_secs = self.config.fine_interval.as_secs(),
            threshold_secs = self.config.fine_threshold.as_secs(),
            "Maturity scheduler started"
        );

        loop {
            let delay = match self.tick().await {
                Ok(report) => report.next_delay,
                Err(e) => {
                    error!(error = %e, "Maturity tick failed");
                    self.config.fine_interval
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Maturity scheduler stopped");
    }
}
