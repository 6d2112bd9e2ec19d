//! Member profile repository (read-only).

use async_trait::async_trait;
use sqlx::PgPool;

use group_order_core::{MemberId, MemberProfile};

use super::{ProfileRepository, RepositoryError};

/// `PostgreSQL`-backed [`ProfileRepository`].
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: MemberId,
    full_name: String,
    real_phone: String,
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn get(&self, member_id: MemberId) -> Result<Option<MemberProfile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT user_id, full_name, real_phone
            FROM member_profiles
            WHERE user_id = $1
            ",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| MemberProfile {
            member_id: r.user_id,
            full_name: r.full_name,
            phone: r.real_phone,
        }))
    }
}
