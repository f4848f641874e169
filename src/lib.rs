//! subkeeper - scheduled subscription lifecycle jobs
//!
//! Once per tick (daily by default) subkeeper:
//!
//! 1. renews active subscriptions past their expiry date that have auto-renew
//!    enabled, by one billing period counted from now;
//! 2. expires every other active subscription past its expiry date.
//!
//! It also ships one-off scripts to seed sample data and to grant roles to users.
//!
//! # Features
//!
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.

pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod scripts;
pub mod store;
pub mod validation;
