//! Group Order CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! go-cli migrate
//!
//! # Batch id for right now, or for a given instant
//! go-cli batch-id
//! go-cli batch-id --at 2026-10-19T01:30:00Z --timezone Asia/Taipei
//!
//! # Is the stored ordering window open?
//! go-cli schedule check
//! go-cli schedule check --at 2026-10-19T10:00:00+08:00
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `batch-id` - Print the ISO-week batch id
//! - `schedule check` - Evaluate the stored ordering schedule

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "go-cli")]
#[command(author, version, about = "Group Order CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Print the batch id orders would get
    BatchId {
        /// Instant to evaluate (RFC 3339), defaults to now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,

        /// Civil timezone (IANA name), defaults to `ORDERING_TIMEZONE` or Asia/Taipei
        #[arg(long, value_parser = parse_tz)]
        timezone: Option<Tz>,
    },
    /// Inspect the ordering schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Check whether the stored window admits orders
    Check {
        /// Instant to evaluate (RFC 3339), defaults to now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,

        /// Civil timezone (IANA name), defaults to `ORDERING_TIMEZONE` or Asia/Taipei
        #[arg(long, value_parser = parse_tz)]
        timezone: Option<Tz>,
    },
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn parse_tz(value: &str) -> Result<Tz, String> {
    value
        .parse::<Tz>()
        .map_err(|e| format!("unknown timezone: {e}"))
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::BatchId { at, timezone } => commands::batch::print_batch_id(at, timezone)?,
        Commands::Schedule { action } => match action {
            ScheduleAction::Check { at, timezone } => {
                commands::schedule::check(at, timezone).await?;
            }
        },
    }
    Ok(())
}
