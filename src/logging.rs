//! Structured logging for subkeeper.
//!
//! - [`init_logging`] installs the global `tracing` subscriber
//! - [`log_subscription_event`] records a lifecycle state change for audit

use std::fmt;
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::{KeeperError, KeeperResult};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> KeeperResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_lowercase()))
        .map_err(|e| KeeperError::ConfigError(format!("invalid log filter: {e}")))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };

    result.map_err(|e| KeeperError::ConfigError(format!("failed to install logger: {e}")))
}

/// Subscription state change event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// Expiry date advanced by one billing period
    Renewed,
    /// Renewal attempted but not applied
    RenewalSkipped,
    /// Sample record inserted
    Seeded,
}

impl fmt::Display for SubscriptionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionEvent::Renewed => "renewed",
            SubscriptionEvent::RenewalSkipped => "renewal_skipped",
            SubscriptionEvent::Seeded => "seeded",
        };
        write!(f, "{}", s)
    }
}

/// Log a subscription state change event.
///
/// # Arguments
///
/// * `event` - The type of subscription event
/// * `subscription_id` - The subscription id
/// * `details` - Optional additional details about the event
pub fn log_subscription_event(
    event: SubscriptionEvent,
    subscription_id: &str,
    details: Option<&str>,
) {
    let span = info_span!(
        "subscription_event",
        event = %event,
        subscription_id = %subscription_id,
    );
    let _enter = span.enter();

    match event {
        SubscriptionEvent::RenewalSkipped => {
            if let Some(d) = details {
                warn!(reason = %d, "Subscription event occurred");
            } else {
                warn!("Subscription event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "Subscription event occurred");
            } else {
                info!("Subscription event occurred");
            }
        }
    }
}
