//! Expire-or-renew decision for a single subscription.

use chrono::NaiveDateTime;

use crate::models::Subscription;

use super::JobError;

/// What a tick does to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Not stale; left alone
    Unchanged,
    /// Stale without auto-renew; status becomes expired
    Expire,
    /// Stale with auto-renew; stays active with a new expiry date
    Renew { new_expiry: NaiveDateTime },
}

/// Decide the transition for `sub` at `now`.
///
/// The new expiry date counts one billing period from `now`, not from the old
/// expiry date.
pub fn decide(sub: &Subscription, now: NaiveDateTime) -> Result<Transition, JobError> {
    if !sub.is_stale(now) {
        return Ok(Transition::Unchanged);
    }

    if !sub.auto_renew {
        return Ok(Transition::Expire);
    }

    let new_expiry = sub
        .billing_cycle
        .advance(now)
        .map_err(|e| JobError::ExecutionError(e.to_string()))?;

    Ok(Transition::Renew { new_expiry })
}
