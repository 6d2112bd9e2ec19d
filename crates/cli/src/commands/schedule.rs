//! Schedule inspection command.
//!
//! Runs the same authoritative check submissions go through: a missing
//! schedule reports closed.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use group_order_server::db::{PgScheduleRepository, ScheduleRepository, create_pool};

use super::{CommandError, database_url, resolve_timezone};

/// Print whether the stored schedule admits orders at `at` (default now).
pub async fn check(at: Option<DateTime<Utc>>, timezone: Option<Tz>) -> Result<(), CommandError> {
    let tz = resolve_timezone(timezone)?;
    let now = at.unwrap_or_else(Utc::now);

    let pool = create_pool(&database_url()?).await?;
    let schedule = PgScheduleRepository::new(pool).get().await?;

    let local = now.with_timezone(&tz);
    let (verdict, window) = match &schedule {
        Some(s) => (
            if s.is_open_at(now, &tz) { "open" } else { "closed" },
            s.to_string(),
        ),
        None => ("closed", "no schedule configured".to_string()),
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{verdict} at {} ({})", local.format("%a %Y-%m-%d %H:%M"), tz.name());
        println!("window: {window}");
    }
    Ok(())
}
