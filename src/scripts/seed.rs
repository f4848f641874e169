//! Sample data for local development.

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use tracing::{debug, info};

use crate::errors::KeeperResult;
use crate::logging::{log_subscription_event, SubscriptionEvent};
use crate::models::{BillingCycle, Subscription, User};
use crate::store::{SubscriptionStore, UserStore};
use crate::validation::validate_range;

/// Upper bound for one seeding run.
pub const MAX_SEED_COUNT: u32 = 10_000;

const SAMPLE_PLANS: &[&str] = &["basic", "standard", "premium"];

const SAMPLE_USERS: &[(&str, &str)] = &[
    ("admin@example.com", "Sample Admin"),
    ("alice@example.com", "Alice Example"),
    ("bob@example.com", "Bob Example"),
];

/// Build `count` sample subscriptions around `now`.
///
/// Records cycle through four shapes so every lifecycle path has data:
/// stale without auto-renew, stale monthly auto-renew, not yet due, and stale
/// yearly auto-renew. Day offsets are random.
pub fn sample_subscriptions(now: NaiveDateTime, count: u32) -> Vec<Subscription> {
    let mut rng = rand::rng();

    (0..count)
        .map(|i| {
            let days = rng.random_range(1..=30);
            let plan = SAMPLE_PLANS[i as usize % SAMPLE_PLANS.len()];

            let (expiry, auto_renew, cycle) = match i % 4 {
                0 => (now - Duration::days(days), false, BillingCycle::Monthly),
                1 => (now - Duration::days(days), true, BillingCycle::Monthly),
                2 => (now + Duration::days(days), rng.random_bool(0.5), BillingCycle::Monthly),
                _ => (now - Duration::days(days), true, BillingCycle::Yearly),
            };

            let mut sub = Subscription::new(expiry, auto_renew, cycle, now);
            sub.plan = Some(plan.to_string());
            sub
        })
        .collect()
}

/// Insert `count` sample subscriptions and return them.
pub async fn seed_subscriptions(
    store: &dyn SubscriptionStore,
    now: NaiveDateTime,
    count: u32,
) -> KeeperResult<Vec<Subscription>> {
    validate_range(count, 1, MAX_SEED_COUNT, "count")?;

    let samples = sample_subscriptions(now, count);

    for sub in &samples {
        store.insert(sub).await?;
        log_subscription_event(SubscriptionEvent::Seeded, &sub.id, None);
    }

    info!("Seeded {} sample subscriptions", samples.len());
    Ok(samples)
}

/// Insert the sample users that do not exist yet; returns the ones inserted.
pub async fn seed_users(store: &dyn UserStore, now: NaiveDateTime) -> KeeperResult<Vec<User>> {
    let mut inserted = Vec::new();

    for (email, name) in SAMPLE_USERS {
        if store.find_user_by_email(email).await?.is_some() {
            debug!("Sample user {} already present", email);
            continue;
        }

        let user = User::new(email, name, now);
        store.insert_user(&user).await?;
        inserted.push(user);
    }

    info!("Seeded {} sample users", inserted.len());
    Ok(inserted)
}

/// Seed sample users and `count` sample subscriptions.
///
/// `count` is checked before anything is written, so a rejected run leaves the
/// store untouched.
pub async fn seed<S>(
    store: &S,
    now: NaiveDateTime,
    count: u32,
) -> KeeperResult<(Vec<User>, Vec<Subscription>)>
where
    S: SubscriptionStore + UserStore,
{
    validate_range(count, 1, MAX_SEED_COUNT, "count")?;

    let users = seed_users(store, now).await?;
    let subscriptions = seed_subscriptions(store, now, count).await?;
    Ok((users, subscriptions))
}
