//! Command-line parsing for the `subkeeper` binary.

/// Usage text printed by `help` and on bad arguments.
pub const USAGE: &str = "\
Usage: subkeeper <command> [options]

Commands:
  run                                Start the lifecycle scheduler (default)
  tick                               Run one lifecycle tick now and exit
  seed [--count N]                   Insert sample subscriptions and users
  assign-role --email E --role R     Grant role R (user, moderator, admin) to a user
  migrate                            Create the database tables
  help                               Show this message";

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the scheduler until interrupted
    Run,
    /// Run a single tick
    Tick,
    /// Insert sample data; `None` uses the configured count
    Seed { count: Option<u32> },
    /// Grant a role to the user with this e-mail
    AssignRole { email: String, role: String },
    /// Create tables
    Migrate,
    /// Print usage
    Help,
}

/// Parse CLI arguments (including the program name at index 0).
///
/// # Supported Commands
///
/// ```text
/// subkeeper run
/// subkeeper tick
/// subkeeper seed --count 25
/// subkeeper assign-role --email ops@example.com --role admin
/// subkeeper migrate
/// ```
pub fn parse_command(args: &[String]) -> Result<Command, String> {
    let Some(command) = args.get(1) else {
        return Ok(Command::Run);
    };

    match command.as_str() {
        "run" => Ok(Command::Run),
        "tick" => Ok(Command::Tick),
        "migrate" => Ok(Command::Migrate),
        "help" | "--help" | "-h" => Ok(Command::Help),
        "seed" => {
            let mut count = None;

            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--count" | "-c" => {
                        let value = args.get(i + 1).ok_or("--count requires a value")?;
                        let parsed = value
                            .parse::<u32>()
                            .map_err(|_| format!("invalid count '{value}'"))?;
                        count = Some(parsed);
                        i += 1;
                    }
                    other => return Err(format!("unknown option for seed: {other}")),
                }
                i += 1;
            }

            Ok(Command::Seed { count })
        }
        "assign-role" => {
            let mut email = None;
            let mut role = None;

            let mut i = 2;
            while i < args.len() {
                match args[i].as_str() {
                    "--email" | "-e" => {
                        email = Some(args.get(i + 1).ok_or("--email requires a value")?.clone());
                        i += 1;
                    }
                    "--role" | "-r" => {
                        role = Some(args.get(i + 1).ok_or("--role requires a value")?.clone());
                        i += 1;
                    }
                    other => return Err(format!("unknown option for assign-role: {other}")),
                }
                i += 1;
            }

            match (email, role) {
                (Some(email), Some(role)) => Ok(Command::AssignRole { email, role }),
                _ => Err("assign-role requires --email and --role".to_string()),
            }
        }
        other => Err(format!("unknown command: {other}")),
    }
}
