//! Page indexer: the write path that feeds the changefeed.
//!
//! Fetches each URI, extracts its visible text, and inserts `(uri, content)`
//! into the source `docs` table through the retry executor. The changefeed
//! then carries the new row to the ingestion server.
//!
//! The insert is not an upsert. Indexing a URI twice hits the primary key,
//! which is a fatal error rather than a retried one.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::error::TxnError;
use crate::extract::extract_text;
use crate::txn::{PgTransaction, RetryPolicy};

const INSERT_DOC: &str = "INSERT INTO docs (uri, content) VALUES ($1, $2)";

pub async fn run_index(config: &Config, uris: &[String]) -> Result<()> {
    let started = Instant::now();
    let pool = db::connect(config).await?;
    let policy = RetryPolicy::from_config(&config.retry);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.store.timeout_secs))
        .build()?;

    for uri in uris {
        println!("Indexing uri {} now ...", uri);
        index_uri(&client, &pool, &policy, uri).await?;
    }

    pool.close().await;
    println!("Total time: {:.3} s", started.elapsed().as_secs_f64());
    Ok(())
}

async fn index_uri(
    client: &reqwest::Client,
    pool: &PgPool,
    policy: &RetryPolicy,
    uri: &str,
) -> Result<()> {
    let html = client
        .get(uri)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to fetch {}", uri))?
        .text()
        .await?;
    let content =
        extract_text(&html).with_context(|| format!("Failed to extract text from {}", uri))?;
    info!(uri, chars = content.len(), "extracted page text");

    insert_doc(pool, policy, uri, &content)
        .await
        .with_context(|| format!("Failed to store {}", uri))
}

/// Inserts one `docs` row, retrying on serialization conflicts.
pub async fn insert_doc(
    pool: &PgPool,
    policy: &RetryPolicy,
    uri: &str,
    content: &str,
) -> Result<(), TxnError<sqlx::Error>> {
    let mut unit = PgTransaction::new(pool, |tx| {
        let uri = uri.to_string();
        let content = content.to_string();
        Box::pin(async move {
            sqlx::query(INSERT_DOC)
                .bind(uri)
                .bind(content)
                .execute(&mut **tx)
                .await?;
            Ok(())
        })
    });
    policy.run(&mut unit).await
}
