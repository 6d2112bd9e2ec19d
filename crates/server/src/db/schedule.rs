//! Ordering schedule repository (read-only; the admin surface owns writes).

use async_trait::async_trait;
use sqlx::PgPool;

use group_order_core::Schedule;

use super::{RepositoryError, ScheduleRepository};

/// `PostgreSQL`-backed [`ScheduleRepository`].
#[derive(Clone)]
pub struct PgScheduleRepository {
    pool: PgPool,
}

impl PgScheduleRepository {
    /// Create a new schedule repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ScheduleRow {
    open_day: i16,
    open_hour: i16,
    close_day: i16,
    close_hour: i16,
    is_always_open: bool,
}

#[async_trait]
impl ScheduleRepository for PgScheduleRepository {
    async fn get(&self) -> Result<Option<Schedule>, RepositoryError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r"
            SELECT open_day, open_hour, close_day, close_hour, is_always_open
            FROM ordering_schedule
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Schedule::new(
                i32::from(r.open_day),
                i32::from(r.open_hour),
                i32::from(r.close_day),
                i32::from(r.close_hour),
                r.is_always_open,
            )
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid schedule row: {e}")))
        })
        .transpose()
    }
}
