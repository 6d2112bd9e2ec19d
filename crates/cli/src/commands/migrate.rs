//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! go-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ORDERING_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/server/migrations/` and are embedded in the
//! server crate's `MIGRATOR`.

use group_order_server::db::{MIGRATOR, create_pool};

use super::{CommandError, database_url};

/// Run all pending migrations.
pub async fn run() -> Result<(), CommandError> {
    let url = database_url()?;

    tracing::info!("Connecting to ordering database...");
    let pool = create_pool(&url).await?;

    tracing::info!(
        migrations = MIGRATOR.iter().count(),
        "Running ordering migrations..."
    );
    MIGRATOR.run(&pool).await?;

    tracing::info!("Ordering migrations complete!");
    Ok(())
}
