//! Lifecycle scheduler tests driven by a manual clock and the in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tokio::sync::Notify;

use subkeeper::clock::ManualClock;
use subkeeper::errors::KeeperResult;
use subkeeper::jobs::{run_lifecycle_tick, JobConfig, JobError, LifecycleScheduler};
use subkeeper::models::{BillingCycle, Subscription, SubscriptionStatus};
use subkeeper::store::{MemoryStore, SubscriptionFilter, SubscriptionStore, SubscriptionUpdate};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 31)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

async fn insert(
    store: &MemoryStore,
    expiry: NaiveDateTime,
    auto_renew: bool,
    cycle: BillingCycle,
) -> Subscription {
    let sub = Subscription::new(expiry, auto_renew, cycle, start() - Duration::days(30));
    store.insert(&sub).await.expect("insert failed");
    sub
}

async fn scheduler_with(
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    config: JobConfig,
) -> LifecycleScheduler {
    LifecycleScheduler::new(store, clock, config)
        .await
        .expect("failed to build scheduler")
}

#[tokio::test]
async fn manual_tick_uses_injected_clock() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));

    let sub = insert(&store, start() + Duration::days(1), true, BillingCycle::Monthly).await;

    let scheduler = scheduler_with(store.clone(), clock.clone(), JobConfig::default()).await;

    let report = scheduler.run_tick_now().await.expect("tick failed");
    assert_eq!(report.renewed, 0);
    assert_eq!(report.started_at, start());

    // Two days later the subscription is due.
    clock.advance(Duration::days(2));
    let report = scheduler.run_tick_now().await.expect("tick failed");
    assert_eq!(report.renewed, 1);

    let renewed = store.get(&sub.id).await.unwrap().unwrap();
    assert_eq!(renewed.status, SubscriptionStatus::Active);
    assert_eq!(
        renewed.expiry_date,
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    );
}

#[tokio::test]
async fn month_end_renewal_clamps() {
    let store = Arc::new(MemoryStore::new());
    let sub = insert(&store, start() - Duration::days(1), true, BillingCycle::Monthly).await;

    run_lifecycle_tick(&*store, start()).await.expect("tick failed");

    let renewed = store.get(&sub.id).await.unwrap().unwrap();
    assert_eq!(
        renewed.expiry_date,
        NaiveDate::from_ymd_opt(2026, 2, 28)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    );
}

#[tokio::test]
async fn failing_renewal_does_not_abort_the_batch() {
    let store = Arc::new(MemoryStore::new());

    let broken = insert(&store, start() - Duration::days(1), true, BillingCycle::Monthly).await;
    let mut healthy = Vec::new();
    for _ in 0..3 {
        healthy.push(insert(&store, start() - Duration::days(1), true, BillingCycle::Yearly).await);
    }
    store.fail_updates_for(&broken.id);

    let report = run_lifecycle_tick(&*store, start()).await.expect("tick failed");

    assert_eq!(report.renewed, 3);
    assert!(!report.is_clean());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].subscription_id, broken.id);

    for sub in healthy {
        let sub = store.get(&sub.id).await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.expiry_date > start());
    }

    // The skipped renewal falls through to the expire sweep of the same tick.
    assert_eq!(report.expired, 1);
    let broken = store.get(&broken.id).await.unwrap().unwrap();
    assert_eq!(broken.status, SubscriptionStatus::Expired);
}

#[tokio::test]
async fn unreachable_store_fails_the_whole_tick() {
    let store = Arc::new(MemoryStore::new());
    insert(&store, start() - Duration::days(1), false, BillingCycle::Monthly).await;
    store.set_offline(true);

    let err = run_lifecycle_tick(&*store, start()).await.unwrap_err();
    assert!(matches!(err, JobError::DatabaseError(_)));

    // Next tick retries once the store is back.
    store.set_offline(false);
    let report = run_lifecycle_tick(&*store, start()).await.expect("tick failed");
    assert_eq!(report.expired, 1);
}

#[tokio::test]
async fn start_and_shutdown_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));

    let mut scheduler = scheduler_with(store, clock, JobConfig::default()).await;
    assert!(!scheduler.is_running());

    scheduler.start().await.expect("failed to start");
    assert!(scheduler.is_running());

    assert!(matches!(
        scheduler.start().await,
        Err(JobError::SchedulerError(_))
    ));

    scheduler.shutdown().await.expect("failed to shut down");
    assert!(!scheduler.is_running());

    // Shutting down twice is harmless.
    scheduler.shutdown().await.expect("second shutdown failed");
}

#[tokio::test]
async fn run_on_startup_ticks_immediately() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let sub = insert(&store, start() - Duration::days(1), false, BillingCycle::Monthly).await;

    let config = JobConfig {
        run_on_startup: true,
        ..JobConfig::default()
    };
    let mut scheduler = scheduler_with(store.clone(), clock, config).await;
    scheduler.start().await.expect("failed to start");

    let sub = store.get(&sub.id).await.unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Expired);

    scheduler.shutdown().await.expect("failed to shut down");
}

#[tokio::test]
async fn invalid_cron_is_rejected_on_start() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));

    let config = JobConfig {
        lifecycle_cron: "not a cron".to_string(),
        ..JobConfig::default()
    };
    let mut scheduler = scheduler_with(store, clock, config).await;

    assert!(matches!(
        scheduler.start().await,
        Err(JobError::SchedulerError(_))
    ));
    assert!(!scheduler.is_running());
}

/// Store whose first `find` parks until released, holding a tick open.
#[derive(Default)]
struct GatedStore {
    inner: MemoryStore,
    gated: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SubscriptionStore for GatedStore {
    async fn update_many(
        &self,
        filter: &SubscriptionFilter,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<u64> {
        self.inner.update_many(filter, update).await
    }

    async fn find(&self, filter: &SubscriptionFilter) -> KeeperResult<Vec<Subscription>> {
        if !self.gated.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.find(filter).await
    }

    async fn find_by_id_and_update(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<Option<Subscription>> {
        self.inner.find_by_id_and_update(id, update).await
    }

    async fn insert(&self, subscription: &Subscription) -> KeeperResult<()> {
        self.inner.insert(subscription).await
    }

    async fn get(&self, id: &str) -> KeeperResult<Option<Subscription>> {
        self.inner.get(id).await
    }
}

#[tokio::test]
async fn overlapping_tick_is_refused() {
    let store = Arc::new(GatedStore::default());
    let clock = Arc::new(ManualClock::new(start()));
    insert(&store.inner, start() - Duration::days(1), false, BillingCycle::Monthly).await;

    let scheduler = LifecycleScheduler::new(store.clone(), clock, JobConfig::default())
        .await
        .expect("failed to build scheduler");

    let (first, second) = tokio::join!(scheduler.run_tick_now(), async {
        store.entered.notified().await;
        let second = scheduler.run_tick_now().await;
        store.release.notify_one();
        second
    });

    assert!(matches!(second, Err(JobError::TickInProgress)));

    let report = first.expect("first tick failed");
    assert_eq!(report.expired, 1);

    // The guard is released once the running tick finishes.
    let report = scheduler.run_tick_now().await.expect("tick failed");
    assert_eq!(report.expired, 0);
}
