//! Auto-renew sweep.
//!
//! Finds stale subscriptions with auto-renew enabled and pushes each one's expiry
//! date forward by one billing period. Each record is updated on its own; a
//! failure is recorded and the sweep moves on.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::logging::{log_subscription_event, SubscriptionEvent};
use crate::store::{SubscriptionFilter, SubscriptionStore, SubscriptionUpdate};

use super::policy::{decide, Transition};
use super::JobError;

/// A subscription the sweep could not renew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRenewal {
    pub subscription_id: String,
    pub reason: String,
}

/// Result of one auto-renew sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenewalOutcome {
    pub renewed: u64,
    pub skipped: Vec<SkippedRenewal>,
}

/// Renew stale auto-renew subscriptions.
///
/// Queries for subscriptions where:
/// - `status = 'active'`
/// - `expiry_date <= now`
/// - `auto_renew = true`
///
/// For each match sets `expiry_date` to `now` plus one billing period; status stays
/// 'active'. Fails only if the initial query fails.
pub async fn run_auto_renew_sweep(
    store: &dyn SubscriptionStore,
    now: NaiveDateTime,
) -> Result<RenewalOutcome, JobError> {
    debug!("Checking for renewable subscriptions at {}", now);

    let due = store
        .find(&SubscriptionFilter::stale(now).with_auto_renew(true))
        .await?;

    let mut outcome = RenewalOutcome::default();

    for sub in due {
        let new_expiry = match decide(&sub, now) {
            Ok(Transition::Renew { new_expiry }) => new_expiry,
            Ok(other) => {
                debug!(
                    subscription_id = %sub.id,
                    transition = ?other,
                    "Subscription no longer due for renewal"
                );
                continue;
            }
            Err(e) => {
                outcome.skip(&sub.id, e.to_string());
                continue;
            }
        };

        match store
            .find_by_id_and_update(&sub.id, &SubscriptionUpdate::renew(new_expiry, now))
            .await
        {
            Ok(Some(_)) => {
                outcome.renewed += 1;
                log_subscription_event(
                    SubscriptionEvent::Renewed,
                    &sub.id,
                    Some(&format!(
                        "{} renewal, expires {}",
                        sub.billing_cycle, new_expiry
                    )),
                );
            }
            Ok(None) => outcome.skip(&sub.id, "subscription disappeared before update".into()),
            Err(e) => outcome.skip(&sub.id, e.to_string()),
        }
    }

    if outcome.renewed > 0 {
        info!(renewed = outcome.renewed, "Auto-renew sweep: subscriptions renewed");
    }
    if !outcome.skipped.is_empty() {
        warn!(
            skipped = outcome.skipped.len(),
            "Auto-renew sweep: some renewals were not applied"
        );
    }

    Ok(outcome)
}

impl RenewalOutcome {
    fn skip(&mut self, subscription_id: &str, reason: String) {
        log_subscription_event(SubscriptionEvent::RenewalSkipped, subscription_id, Some(&reason));
        self.skipped.push(SkippedRenewal {
            subscription_id: subscription_id.to_string(),
            reason,
        });
    }
}
