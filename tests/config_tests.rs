use std::env;

use serial_test::serial;
use subkeeper::config::KeeperConfig;
use subkeeper::jobs::JobConfig;

const VARS: &[&str] = &[
    "SUBKEEPER_DATABASE_TYPE",
    "SUBKEEPER_DATABASE_URL",
    "SUBKEEPER_LOG_LEVEL",
    "SUBKEEPER_LOG_FORMAT",
    "SUBKEEPER_LIFECYCLE_CRON",
    "SUBKEEPER_RUN_ON_STARTUP",
    "SUBKEEPER_SEED_COUNT",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_load_without_environment() {
    clear_env();

    let config = KeeperConfig::load().expect("config should load");
    config.validate().expect("defaults should validate");

    // A config.toml in the working directory may override these, so only check
    // that the values are usable.
    assert!(!config.jobs.lifecycle_cron.is_empty());
    assert!(config.seed.subscription_count > 0);
}

#[test]
#[serial]
fn environment_overrides_file_and_defaults() {
    clear_env();
    env::set_var("SUBKEEPER_DATABASE_URL", "sqlite::memory:");
    env::set_var("SUBKEEPER_LOG_LEVEL", "debug");
    env::set_var("SUBKEEPER_LIFECYCLE_CRON", "0 30 1 * * *");
    env::set_var("SUBKEEPER_RUN_ON_STARTUP", "true");
    env::set_var("SUBKEEPER_SEED_COUNT", "42");

    let config = KeeperConfig::load().expect("config should load");

    assert_eq!(config.database.sqlite_url, "sqlite::memory:");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.jobs.lifecycle_cron, "0 30 1 * * *");
    assert!(config.jobs.run_on_startup);
    assert_eq!(config.seed.subscription_count, 42);

    let jobs = JobConfig::from(&config.jobs);
    assert_eq!(jobs.lifecycle_cron, "0 30 1 * * *");
    assert!(jobs.run_on_startup);

    clear_env();
}

#[test]
#[serial]
fn postgres_url_routes_to_postgres_setting() {
    clear_env();
    env::set_var("SUBKEEPER_DATABASE_TYPE", "postgres");
    env::set_var("SUBKEEPER_DATABASE_URL", "postgres://db.internal/subs");

    let config = KeeperConfig::load().expect("config should load");
    assert_eq!(config.database.db_type, "postgres");
    assert_eq!(config.database.url(), "postgres://db.internal/subs");

    clear_env();
}

#[test]
#[serial]
fn invalid_log_level_fails_validation() {
    clear_env();
    env::set_var("SUBKEEPER_LOG_LEVEL", "loud");

    let config = KeeperConfig::load().expect("config should load");
    assert!(config.validate().is_err());

    clear_env();
}
