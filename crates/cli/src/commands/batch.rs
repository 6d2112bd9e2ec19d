//! Batch id command.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use group_order_core::BatchId;

use super::{CommandError, resolve_timezone};

/// Print the batch id for `at` (default now).
pub fn print_batch_id(at: Option<DateTime<Utc>>, timezone: Option<Tz>) -> Result<(), CommandError> {
    let tz = resolve_timezone(timezone)?;
    let now = at.unwrap_or_else(Utc::now);

    #[allow(clippy::print_stdout)]
    {
        println!("{}", BatchId::for_instant(now, &tz));
    }
    Ok(())
}
