//! Job store access for promptq.
//!
//! [`repositories::JobRepo`] holds the SQL; [`store::JobStore`] is the seam
//! the worker codes against, implemented by [`store::PgJobStore`] for
//! PostgreSQL and [`memory::MemoryJobStore`] for tests and local runs.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;
pub mod table;

pub type DbPool = sqlx::PgPool;

/// Build connection options from a URL, optionally replacing the
/// database named in it.
pub fn connect_options(
    database_url: &str,
    database_name: Option<&str>,
) -> Result<PgConnectOptions, sqlx::Error> {
    let options = PgConnectOptions::from_str(database_url)?;
    Ok(match database_name {
        Some(name) => options.database(name),
        None => options,
    })
}

/// Create a connection pool.
///
/// The worker writes from a single task, so a handful of connections
/// is plenty.
pub async fn create_pool(options: PgConnectOptions) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
