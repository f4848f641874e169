#![cfg(feature = "sqlite")]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqlitePoolOptions;

use subkeeper::config::DatabaseConfig;
use subkeeper::errors::{KeeperError, KeeperResult};
use subkeeper::models::{BillingCycle, Role, Subscription, SubscriptionStatus, User};
use subkeeper::store::{
    Database, SubscriptionFilter, SubscriptionStore, SubscriptionUpdate, UserStore,
};

/// Helper: create an in-memory SQLite Database with both tables.
async fn setup_in_memory_db() -> KeeperResult<Arc<Database>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| KeeperError::ConnectionError(format!("db connect failed: {e}")))?;

    let db = Database::SQLite(pool);
    db.migrate().await?;
    Ok(Arc::new(db))
}

fn ts(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

#[tokio::test]
async fn insert_and_get_round_trip() -> KeeperResult<()> {
    let db = setup_in_memory_db().await?;

    let mut sub = Subscription::new(ts(20), true, BillingCycle::Yearly, ts(1));
    sub.user_id = Some("user-1".to_string());
    sub.plan = Some("premium".to_string());
    db.insert(&sub).await?;

    assert_eq!(db.get(&sub.id).await?, Some(sub));
    assert_eq!(db.get("missing").await?, None);
    Ok(())
}

#[tokio::test]
async fn find_combines_predicates() -> KeeperResult<()> {
    let db = setup_in_memory_db().await?;
    let now = ts(18);

    let renewable = Subscription::new(ts(10), true, BillingCycle::Monthly, ts(1));
    let manual = Subscription::new(ts(10), false, BillingCycle::Monthly, ts(1));
    let future = Subscription::new(ts(25), true, BillingCycle::Monthly, ts(1));
    for sub in [&renewable, &manual, &future] {
        db.insert(sub).await?;
    }

    let all = db.find(&SubscriptionFilter::default()).await?;
    assert_eq!(all.len(), 3);

    let stale = db.find(&SubscriptionFilter::stale(now)).await?;
    assert_eq!(stale.len(), 2);

    let due = db
        .find(&SubscriptionFilter::stale(now).with_auto_renew(true))
        .await?;
    assert_eq!(due, vec![renewable]);
    Ok(())
}

#[tokio::test]
async fn update_many_only_touches_matches() -> KeeperResult<()> {
    let db = setup_in_memory_db().await?;
    let now = ts(18);

    let stale = Subscription::new(ts(17), false, BillingCycle::Monthly, ts(1));
    let mut already = Subscription::new(ts(2), false, BillingCycle::Monthly, ts(1));
    already.status = SubscriptionStatus::Expired;
    db.insert(&stale).await?;
    db.insert(&already).await?;

    let count = db
        .update_many(&SubscriptionFilter::stale(now), &SubscriptionUpdate::expire(now))
        .await?;
    assert_eq!(count, 1);

    let stale = db.get(&stale.id).await?.unwrap();
    assert_eq!(stale.status, SubscriptionStatus::Expired);
    assert_eq!(stale.updated_at, now);

    // Untouched row keeps its original updated_at
    assert_eq!(db.get(&already.id).await?.unwrap().updated_at, ts(1));
    Ok(())
}

#[tokio::test]
async fn find_by_id_and_update_returns_updated_row() -> KeeperResult<()> {
    let db = setup_in_memory_db().await?;
    let now = ts(18);

    let sub = Subscription::new(ts(17), true, BillingCycle::Monthly, ts(1));
    db.insert(&sub).await?;

    let next = now + Duration::days(31);
    let updated = db
        .find_by_id_and_update(&sub.id, &SubscriptionUpdate::renew(next, now))
        .await?
        .expect("row should exist");

    assert_eq!(updated.expiry_date, next);
    assert_eq!(updated.status, SubscriptionStatus::Active);
    assert_eq!(updated.updated_at, now);

    let missing = db
        .find_by_id_and_update("nope", &SubscriptionUpdate::renew(next, now))
        .await?;
    assert!(missing.is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_status_is_an_invalid_record() -> KeeperResult<()> {
    let db = setup_in_memory_db().await?;

    let pool = match &*db {
        Database::SQLite(pool) => pool,
        #[cfg(feature = "postgres")]
        Database::Postgres(_) => panic!("PostgreSQL not supported in tests"),
    };
    sqlx::query(
        r#"
        INSERT INTO subscriptions (
            id, status, expiry_date, auto_renew, billing_cycle, created_at, updated_at
        )
        VALUES ('odd-1', 'paused', ?, 0, 'monthly', ?, ?)
        "#,
    )
    .bind(ts(5))
    .bind(ts(1))
    .bind(ts(1))
    .execute(pool)
    .await
    .map_err(KeeperError::from)?;

    let err = db.get("odd-1").await.unwrap_err();
    assert!(matches!(err, KeeperError::InvalidRecord(_)));

    // Not matched by the stale filter, so sweeps never see it
    assert!(db.find(&SubscriptionFilter::stale(ts(18))).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn user_role_can_be_changed() -> KeeperResult<()> {
    let db = setup_in_memory_db().await?;

    let user = User::new("ops@example.com", "Ops", ts(1));
    db.insert_user(&user).await?;

    let found = db.find_user_by_email("ops@example.com").await?.unwrap();
    assert_eq!(found.role, Role::User);

    let updated = db.set_user_role(&user.id, Role::Admin, ts(2)).await?.unwrap();
    assert_eq!(updated.role, Role::Admin);
    assert_eq!(updated.updated_at, ts(2));

    assert!(db.set_user_role("ghost", Role::Admin, ts(2)).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_rejected() -> KeeperResult<()> {
    let db = setup_in_memory_db().await?;

    db.insert_user(&User::new("dup@example.com", "First", ts(1)))
        .await?;
    let err = db
        .insert_user(&User::new("dup@example.com", "Second", ts(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, KeeperError::DatabaseError(_)));
    Ok(())
}

#[tokio::test]
async fn connect_from_config_uses_single_connection_for_memory() -> KeeperResult<()> {
    let config = DatabaseConfig {
        db_type: "sqlite".to_string(),
        sqlite_url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };

    let db = Database::connect(&config).await?;
    db.migrate().await?;

    // Tables created by migrate are visible to later queries on the same pool.
    let sub = Subscription::new(ts(20), false, BillingCycle::Monthly, ts(1));
    db.insert(&sub).await?;
    assert!(db.get(&sub.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn unsupported_database_type_is_a_config_error() {
    let config = DatabaseConfig {
        db_type: "mongodb".to_string(),
        ..DatabaseConfig::default()
    };

    let err = Database::connect(&config).await.unwrap_err();
    assert!(matches!(err, KeeperError::ConfigError(_)));
}
