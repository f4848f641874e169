//! One lifecycle tick: renew first, then expire.
//!
//! Both sweeps see the same `now`. Renewed records move into the future, so the
//! expire sweep that follows cannot touch them; a renewal that was skipped is
//! expired by that same sweep.

use chrono::NaiveDateTime;
use tracing::{info, info_span, Instrument};

use crate::store::SubscriptionStore;

use super::auto_renew::{run_auto_renew_sweep, SkippedRenewal};
use super::expire_sweep::run_expire_sweep;
use super::JobError;

/// Summary of a tick that ran to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub started_at: NaiveDateTime,
    pub renewed: u64,
    pub expired: u64,
    pub skipped: Vec<SkippedRenewal>,
}

impl TickReport {
    /// No record was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Run the auto-renew sweep followed by the expire sweep.
///
/// `Err` means the tick failed as a whole (a sweep's query failed). Individual
/// renewal failures are reported in [`TickReport::skipped`].
pub async fn run_lifecycle_tick(
    store: &dyn SubscriptionStore,
    now: NaiveDateTime,
) -> Result<TickReport, JobError> {
    let span = info_span!("lifecycle_tick", now = %now);

    async move {
        let renewal = run_auto_renew_sweep(store, now).await?;
        let expired = run_expire_sweep(store, now).await?;

        let report = TickReport {
            started_at: now,
            renewed: renewal.renewed,
            expired,
            skipped: renewal.skipped,
        };

        info!(
            renewed = report.renewed,
            expired = report.expired,
            skipped = report.skipped.len(),
            "Lifecycle tick finished"
        );

        Ok(report)
    }
    .instrument(span)
    .await
}
