//! Subscription and user stores.
//!
//! - `database` → `sqlx` over SQLite/Postgres
//! - `memory`   → in-process store for tests and dry runs
//!
//! The lifecycle job only talks to [`SubscriptionStore`]; the scripts also use
//! [`UserStore`].

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::errors::KeeperResult;
use crate::models::{Role, Subscription, SubscriptionStatus, User};

pub mod database;
pub mod memory;

pub use database::Database;
pub use memory::MemoryStore;

/// Conjunction of optional predicates over subscription records.
///
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub status: Option<SubscriptionStatus>,
    pub expires_at_or_before: Option<NaiveDateTime>,
    pub auto_renew: Option<bool>,
}

impl SubscriptionFilter {
    /// Active records whose expiry date is at or before `now`.
    pub fn stale(now: NaiveDateTime) -> Self {
        Self {
            status: Some(SubscriptionStatus::Active),
            expires_at_or_before: Some(now),
            auto_renew: None,
        }
    }

    pub fn with_auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = Some(auto_renew);
        self
    }

    pub fn matches(&self, sub: &Subscription) -> bool {
        self.status.map_or(true, |s| sub.status == s)
            && self
                .expires_at_or_before
                .map_or(true, |t| sub.expiry_date <= t)
            && self.auto_renew.map_or(true, |a| sub.auto_renew == a)
    }
}

/// Fields to overwrite on matching records. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub status: Option<SubscriptionStatus>,
    pub expiry_date: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl SubscriptionUpdate {
    pub fn expire(now: NaiveDateTime) -> Self {
        Self {
            status: Some(SubscriptionStatus::Expired),
            expiry_date: None,
            updated_at: Some(now),
        }
    }

    pub fn renew(new_expiry: NaiveDateTime, now: NaiveDateTime) -> Self {
        Self {
            status: None,
            expiry_date: Some(new_expiry),
            updated_at: Some(now),
        }
    }

    pub fn apply(&self, sub: &mut Subscription) {
        if let Some(status) = self.status {
            sub.status = status;
        }
        if let Some(expiry) = self.expiry_date {
            sub.expiry_date = expiry;
        }
        if let Some(updated_at) = self.updated_at {
            sub.updated_at = updated_at;
        }
    }
}

/// Persisted collection of subscription records.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Apply `update` to every record matching `filter`; returns the number changed.
    async fn update_many(
        &self,
        filter: &SubscriptionFilter,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<u64>;

    /// All records matching `filter`, in no particular order.
    async fn find(&self, filter: &SubscriptionFilter) -> KeeperResult<Vec<Subscription>>;

    /// Update one record by id and return it, or `None` if it does not exist.
    async fn find_by_id_and_update(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<Option<Subscription>>;

    async fn insert(&self, subscription: &Subscription) -> KeeperResult<()>;

    async fn get(&self, id: &str) -> KeeperResult<Option<Subscription>>;
}

/// Persisted collection of user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> KeeperResult<()>;

    async fn find_user_by_email(&self, email: &str) -> KeeperResult<Option<User>>;

    /// Set the role of the user with `id`; `None` if no such user.
    async fn set_user_role(
        &self,
        id: &str,
        role: Role,
        now: NaiveDateTime,
    ) -> KeeperResult<Option<User>>;
}
