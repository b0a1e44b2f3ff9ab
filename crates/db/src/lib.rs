//! Database initialization and migration logic for the storefront backend.
//!
//! Provides `init_db_pool` for creating a connection pool and
//! applying the SQL migrations from the configured directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use app_config::AppConfig;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio::fs;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::info;

/// Initializes the database connection pool and runs migrations.
///
/// # Arguments
/// * `cfg` - The loaded application configuration.
///
/// # Errors
/// Returns an error if the pool cannot be created or migrations fail.
pub async fn init_db_pool(cfg: &AppConfig) -> Result<Pool> {
    let pg_config: PgConfig = cfg.db_dsn().parse().context("Failed to parse Postgres DSN")?;

    let mgr = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    let pool = Pool::builder(mgr)
        .max_size(cfg.db_pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .context("Failed to create database pool")?;

    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for migrations")?;
    run_migrations(&client, &cfg.migrations_dir).await?;

    Ok(pool)
}

/// Applies every `.sql` file of `migrations_dir`, in file-name order.
///
/// Migrations run on every start, so they must be idempotent
/// (`CREATE TABLE IF NOT EXISTS`, ...).
///
/// # Errors
/// Returns an error if migration files cannot be read or applied.
pub async fn run_migrations(client: &Client, migrations_dir: &str) -> Result<()> {
    for path in migration_files(migrations_dir).await? {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Applying migration: {}", file_name);

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read migration file {file_name}"))?;
        client
            .batch_execute(&content)
            .await
            .with_context(|| format!("Failed to execute migration {file_name}"))?;
    }
    Ok(())
}

/// Lists the `.sql` files of a directory sorted by name.
pub async fn migration_files(migrations_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(migrations_dir.as_ref())
        .await
        .context("Failed to read migrations directory")?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migration_files_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0002_items.sql", "README.md", "0001_init.sql", "0010_late.sql"] {
            std::fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }

        let files = migration_files(dir.path()).await.unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0001_init.sql", "0002_items.sql", "0010_late.sql"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        assert!(migration_files("definitely/not/here").await.is_err());
    }
}
