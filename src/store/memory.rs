use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::errors::{KeeperError, KeeperResult};
use crate::models::{Role, Subscription, User};

use super::{SubscriptionFilter, SubscriptionStore, SubscriptionUpdate, UserStore};

#[derive(Debug, Default)]
struct State {
    subscriptions: HashMap<String, Subscription>,
    users: HashMap<String, User>,
    /// Ids whose single-record updates fail
    failing_ids: HashSet<String>,
    /// Every operation fails, as if the store were unreachable
    offline: bool,
}

/// In-process store keyed by record id.
///
/// Supports failure injection so callers can observe partial-failure handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> KeeperResult<MutexGuard<'_, State>> {
        let state = self
            .state
            .lock()
            .map_err(|_| KeeperError::DatabaseError("failed to acquire store lock".into()))?;

        if state.offline {
            return Err(KeeperError::ConnectionError("store is offline".into()));
        }

        Ok(state)
    }

    /// Make `find_by_id_and_update` fail for `id`.
    pub fn fail_updates_for(&self, id: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.failing_ids.insert(id.to_string());
    }

    /// Make every operation fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.offline = offline;
    }

    /// Snapshot of all subscriptions.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.subscriptions.values().cloned().collect()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn update_many(
        &self,
        filter: &SubscriptionFilter,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<u64> {
        let mut state = self.lock()?;
        let mut count = 0;

        for sub in state.subscriptions.values_mut() {
            if filter.matches(sub) {
                update.apply(sub);
                count += 1;
            }
        }

        Ok(count)
    }

    async fn find(&self, filter: &SubscriptionFilter) -> KeeperResult<Vec<Subscription>> {
        let state = self.lock()?;
        Ok(state
            .subscriptions
            .values()
            .filter(|sub| filter.matches(sub))
            .cloned()
            .collect())
    }

    async fn find_by_id_and_update(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<Option<Subscription>> {
        let mut state = self.lock()?;

        if state.failing_ids.contains(id) {
            return Err(KeeperError::DatabaseError(format!(
                "update of subscription {id} rejected"
            )));
        }

        Ok(state.subscriptions.get_mut(id).map(|sub| {
            update.apply(sub);
            sub.clone()
        }))
    }

    async fn insert(&self, subscription: &Subscription) -> KeeperResult<()> {
        let mut state = self.lock()?;

        if state.subscriptions.contains_key(&subscription.id) {
            return Err(KeeperError::DatabaseError(format!(
                "subscription {} already exists",
                subscription.id
            )));
        }

        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> KeeperResult<Option<Subscription>> {
        let state = self.lock()?;
        Ok(state.subscriptions.get(id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> KeeperResult<()> {
        let mut state = self.lock()?;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(KeeperError::DatabaseError(format!(
                "user with email {} already exists",
                user.email
            )));
        }

        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> KeeperResult<Option<User>> {
        let state = self.lock()?;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_user_role(
        &self,
        id: &str,
        role: Role,
        now: NaiveDateTime,
    ) -> KeeperResult<Option<User>> {
        let mut state = self.lock()?;
        Ok(state.users.get_mut(id).map(|user| {
            user.role = role;
            user.updated_at = now;
            user.clone()
        }))
    }
}
