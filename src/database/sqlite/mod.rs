use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::{RagError, Result};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Attach a human-readable context to a sqlx failure.
pub(crate) trait StoreContext<T> {
    fn store_context(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> StoreContext<T> for std::result::Result<T, E> {
    #[inline]
    fn store_context(self, context: &str) -> Result<T> {
        self.map_err(|e| RagError::Store(format!("{}: {}", context, e)))
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P, config: &StoreConfig) -> Result<Self> {
        let database_path = database_path.as_ref();
        if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .store_context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .store_context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Cheap round trip used by health reporting
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .store_context("Database is not reachable")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
