//! Database module

pub mod queries;
pub mod store;

pub use store::{ClientStore, NewClient, NewMember, NewRoute, PgStore, RouteStore, UserDirectory};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

/// Run database migrations.
///
/// Stored checksums are first brought in line with the compiled migrations,
/// so line-ending differences between platforms do not block startup.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    let migrator = sqlx::migrate!("./migrations");

    fix_migration_checksums(pool, &migrator).await?;
    migrator.run(pool).await.context("Failed to apply migrations")?;

    info!("Database migrations complete");
    Ok(())
}

async fn migrations_table_exists(pool: &PgPool) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

async fn fix_migration_checksums(pool: &PgPool, migrator: &sqlx::migrate::Migrator) -> Result<()> {
    if !migrations_table_exists(pool).await? {
        return Ok(());
    }

    for migration in migrator.iter() {
        if migration.migration_type.is_down_migration() {
            continue;
        }

        let stored: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT checksum FROM _sqlx_migrations WHERE version = $1")
                .bind(migration.version)
                .fetch_optional(pool)
                .await?;

        if let Some((stored_checksum,)) = stored {
            let current_checksum: &[u8] = &migration.checksum;
            if stored_checksum != current_checksum {
                warn!(
                    "Migration {} ({}) checksum mismatch, updating stored checksum",
                    migration.version, migration.description
                );
                sqlx::query("UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2")
                    .bind(current_checksum)
                    .bind(migration.version)
                    .execute(pool)
                    .await?;
            }
        }
    }

    Ok(())
}
