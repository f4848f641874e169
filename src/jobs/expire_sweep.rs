//! Expire sweep.
//!
//! Moves every active subscription whose expiry date has passed to 'expired' in a
//! single bulk update.

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::store::{SubscriptionFilter, SubscriptionStore, SubscriptionUpdate};

use super::JobError;

/// Expire stale subscriptions.
///
/// Matches records where:
/// - `status = 'active'`
/// - `expiry_date <= now`
///
/// and sets `status = 'expired'`. Running it again with the same `now` changes
/// nothing.
///
/// Returns the number of subscriptions that were expired.
pub async fn run_expire_sweep(
    store: &dyn SubscriptionStore,
    now: NaiveDateTime,
) -> Result<u64, JobError> {
    debug!("Checking for expired subscriptions at {}", now);

    let count = store
        .update_many(
            &SubscriptionFilter::stale(now),
            &SubscriptionUpdate::expire(now),
        )
        .await?;

    if count > 0 {
        info!(expired = count, "Expire sweep: subscriptions expired");
    }

    Ok(count)
}
