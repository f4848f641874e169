use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use subkeeper::cli::{parse_command, Command, USAGE};
use subkeeper::clock::{Clock, SystemClock};
use subkeeper::config::get_config;
use subkeeper::errors::KeeperError;
use subkeeper::jobs::{JobConfig, LifecycleScheduler};
use subkeeper::logging::init_logging;
use subkeeper::scripts::{assign_role, seed};
use subkeeper::store::Database;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    if command == Command::Help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config()?;
    init_logging(&config.logging)?;

    let db = Database::from_config().await?;
    info!("Connected to {} database", db.kind());
    db.migrate().await?;

    let clock = SystemClock;

    match command {
        Command::Run => {
            let mut scheduler = LifecycleScheduler::new(
                db.clone(),
                Arc::new(clock),
                JobConfig::from(&config.jobs),
            )
            .await?;
            scheduler.start().await?;

            tokio::signal::ctrl_c()
                .await
                .map_err(|e| {
                    KeeperError::ConfigError(format!("failed to listen for ctrl-c: {e}"))
                })?;

            scheduler.shutdown().await?;
        }
        Command::Tick => {
            let scheduler =
                LifecycleScheduler::new(db.clone(), Arc::new(clock), JobConfig::from(&config.jobs))
                    .await?;
            let report = scheduler.run_tick_now().await?;
            println!(
                "renewed: {}, expired: {}, skipped: {}",
                report.renewed,
                report.expired,
                report.skipped.len()
            );
            for skipped in &report.skipped {
                println!("  skipped {}: {}", skipped.subscription_id, skipped.reason);
            }
        }
        Command::Seed { count } => {
            let count = count.unwrap_or(config.seed.subscription_count);
            let now = clock.now();
            let (users, subs) = seed(&*db, now, count).await?;
            println!(
                "inserted {} subscriptions and {} users",
                subs.len(),
                users.len()
            );
        }
        Command::AssignRole { email, role } => {
            let user = assign_role(&*db, &email, &role, clock.now()).await?;
            println!("{} now has role {}", user.email, user.role);
        }
        Command::Migrate => {
            println!("schema is up to date");
        }
        Command::Help => println!("{USAGE}"),
    }

    Ok(())
}
