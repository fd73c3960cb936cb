use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

/// Failure reported by a repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the offending field.
    #[error("{0} already exists")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                let field = db_err
                    .constraint()
                    .map(field_from_constraint)
                    .unwrap_or("record");
                return StoreError::Conflict(field.to_string());
            }
        }
        StoreError::Other(e.into())
    }
}

// Postgres names unique constraints `<table>_<column>_key`.
fn field_from_constraint(constraint: &str) -> &str {
    constraint
        .strip_suffix("_key")
        .and_then(|s| s.split_once('_').map(|(_, column)| column))
        .unwrap_or("record")
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    /// Creates or updates the `users` and `artworks` tables.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        tracing::info!("database connected and migrated");
        Ok(())
    }
}
