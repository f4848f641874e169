//! Domain records handled by the lifecycle job and the scripts.

use chrono::{Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::errors::{KeeperError, KeeperResult};

/// Subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Current billing period is running (or awaiting the next tick)
    Active,
    /// Billing period ended without renewal; terminal for the lifecycle job
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(KeeperError::InvalidInput(format!(
                "unknown subscription status '{other}'"
            ))),
        }
    }
}

/// Billing cycle of a subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    /// Length of one billing period.
    pub fn period(&self) -> Months {
        match self {
            BillingCycle::Monthly => Months::new(1),
            BillingCycle::Yearly => Months::new(12),
        }
    }

    /// End of a billing period starting at `from`.
    ///
    /// Days past the end of the target month clamp to its last day.
    pub fn advance(&self, from: NaiveDateTime) -> KeeperResult<NaiveDateTime> {
        from.checked_add_months(self.period()).ok_or_else(|| {
            KeeperError::InvalidInput(format!(
                "renewal of {} from {from} is out of range",
                self.as_str()
            ))
        })
    }

    /// Decode a value that is already persisted.
    ///
    /// Anything other than `monthly` renews for twelve months.
    pub fn from_stored(value: &str) -> Self {
        match value.parse() {
            Ok(cycle) => cycle,
            Err(_) => {
                warn!(
                    billing_cycle = %value,
                    "Unrecognised billing cycle in store, treating as yearly"
                );
                BillingCycle::Yearly
            }
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            other => Err(KeeperError::InvalidInput(format!(
                "unknown billing cycle '{other}' (expected 'monthly' or 'yearly')"
            ))),
        }
    }
}

/// A customer's purchase of a recurring plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: Option<String>,
    pub plan: Option<String>,
    pub status: SubscriptionStatus,
    pub expiry_date: NaiveDateTime,
    pub auto_renew: bool,
    pub billing_cycle: BillingCycle,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Subscription {
    /// New active subscription with a generated id.
    pub fn new(
        expiry_date: NaiveDateTime,
        auto_renew: bool,
        billing_cycle: BillingCycle,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            plan: None,
            status: SubscriptionStatus::Active,
            expiry_date,
            auto_renew,
            billing_cycle,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active with an expiry date at or before `now`.
    pub fn is_stale(&self, now: NaiveDateTime) -> bool {
        self.status == SubscriptionStatus::Active && self.expiry_date <= now
    }
}

/// Role granted to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(KeeperError::InvalidInput(format!(
                "unknown role '{other}' (expected user, moderator or admin)"
            ))),
        }
    }
}

/// A user account, touched only by the scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn new(email: &str, name: &str, now: NaiveDateTime) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }
}
