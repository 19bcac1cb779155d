use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Connects to the source database named in `[source]`.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let source = config.source()?;

    let pool = PgPoolOptions::new()
        .max_connections(source.max_connections)
        .acquire_timeout(Duration::from_secs(source.connect_timeout_secs))
        .connect(&source.url)
        .await
        .with_context(|| "Failed to connect to source database")?;

    Ok(pool)
}
