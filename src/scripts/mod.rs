//! One-off maintenance scripts run from the command line.

pub mod roles;
pub mod seed;

pub use roles::assign_role;
pub use seed::{sample_subscriptions, seed, seed_subscriptions, seed_users, MAX_SEED_COUNT};
