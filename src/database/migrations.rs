//! Database Migrations
//!
//! Embedded refinery migrations from the `migrations/` directory, applied at
//! startup before the server begins accepting requests.

use anyhow::{Context, Result};
use deadpool_postgres::Pool;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Run all pending migrations
pub async fn run_migrations(pool: &Pool) -> Result<()> {
    tracing::info!("🔄 Running database migrations...");

    let mut conn = pool
        .get()
        .await
        .context("Failed to get connection for migrations")?;
    let client = &mut **conn;

    let report = embedded::migrations::runner()
        .run_async(client)
        .await
        .context("Failed to apply migrations")?;

    for migration in report.applied_migrations() {
        tracing::info!("applied migration {}", migration);
    }
    tracing::info!("✅ Database migrations completed");
    Ok(())
}
