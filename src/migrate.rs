use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::db;

/// Creates the `docs` table the page indexer writes into.
///
/// Safe to run repeatedly. The changefeed itself is created by the operator:
///
/// ```sql
/// SET CLUSTER SETTING kv.rangefeed.enabled = true;
/// CREATE CHANGEFEED FOR TABLE docs INTO 'http://localhost:3000/' WITH updated, full_table_name;
/// ```
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS docs (
            uri TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            ts TIMESTAMP DEFAULT NOW()
        )
        "#,
    )
    .execute(&pool)
    .await?;

    info!("docs table ready");
    pool.close().await;
    Ok(())
}
