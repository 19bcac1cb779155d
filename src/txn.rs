//! Retryable transaction executor.
//!
//! Optimistic-concurrency databases (CockroachDB in particular) abort
//! transactions that cannot be serialized and expect the client to run them
//! again. [`RetryPolicy::run`] drives a [`RetryableUnit`] through
//!
//! ```text
//! Attempting ──ok──────────────▶ Success
//!     │
//!     ├─retryable, budget left──▶ Retrying ──sleep──▶ Attempting
//!     ├─retryable, budget spent─▶ RetriesExhausted
//!     └─fatal──────────────────▶ NonRetryable
//! ```
//!
//! The backoff before retry `n` is `base * 2^n * jitter`, jitter uniform in
//! `[0.5, 1.5)`, capped at `max_delay`. Units are run at least once and may
//! run more than once, so they must be safe to re-execute.
//!
//! [`PgTransaction`] wraps an operation in a Postgres transaction and
//! classifies SQLSTATE `40001`/`40P01` as retryable.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::TxnError;

const JITTER_LOW: f64 = 0.5;
const JITTER_HIGH: f64 = 1.5;

/// Outcome of classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient conflict; running the unit again may succeed.
    Retryable,
    Fatal,
}

/// A re-executable unit of work plus the rule that classifies its errors.
#[async_trait]
pub trait RetryableUnit: Send {
    type Output: Send;
    type Error: std::error::Error + Send + 'static;

    /// Runs the unit once. A failed attempt must leave no partial effects.
    async fn attempt(&mut self) -> Result<Self::Output, Self::Error>;

    fn classify(&self, err: &Self::Error) -> ErrorClass;
}

/// Retry budget and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), config.max_delay())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(JITTER_LOW..JITTER_HIGH);
        self.scaled_delay(attempt, jitter)
    }

    fn scaled_delay(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32) * jitter;
        let delay = self.base_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Runs `unit` until it succeeds, fails fatally, or the budget is spent.
    pub async fn run<U: RetryableUnit>(
        &self,
        unit: &mut U,
    ) -> Result<U::Output, TxnError<U::Error>> {
        let mut attempt = 1;
        loop {
            let err = match unit.attempt().await {
                Ok(output) => {
                    debug!(attempt, "transaction committed");
                    return Ok(output);
                }
                Err(err) => err,
            };

            if unit.classify(&err) == ErrorClass::Fatal {
                warn!(attempt, error = %err, "non-retryable transaction error");
                return Err(TxnError::NonRetryable {
                    attempt,
                    source: err,
                });
            }

            if attempt >= self.max_attempts {
                warn!(attempts = attempt, error = %err, "transaction retries exhausted");
                return Err(TxnError::RetriesExhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = self.backoff(attempt);
            warn!(attempt, ?delay, error = %err, "serialization conflict, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Boxed future returned by a [`PgTransaction`] operation.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, sqlx::Error>> + Send + 't>>;

/// Classifies Postgres/CockroachDB errors by SQLSTATE.
///
/// `40001` (serialization failure, CockroachDB's "restart transaction") and
/// `40P01` (deadlock) are retryable. Everything else, unique violations
/// included, is fatal.
pub fn classify_sqlx_error(err: &sqlx::Error) -> ErrorClass {
    match err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("40001") | Some("40P01") => ErrorClass::Retryable,
            _ => ErrorClass::Fatal,
        },
        _ => ErrorClass::Fatal,
    }
}

/// A [`RetryableUnit`] that runs `op` inside its own Postgres transaction.
///
/// Each attempt begins a transaction, runs `op`, and commits. If `op` or the
/// commit fails the transaction is rolled back before the error is returned.
pub struct PgTransaction<'p, F> {
    pool: &'p PgPool,
    op: F,
}

impl<'p, F> PgTransaction<'p, F> {
    pub fn new<T>(pool: &'p PgPool, op: F) -> Self
    where
        F: for<'t> FnMut(&'t mut Transaction<'static, Postgres>) -> TxFuture<'t, T> + Send,
    {
        Self { pool, op }
    }
}

#[async_trait]
impl<'p, F, T> RetryableUnit for PgTransaction<'p, F>
where
    F: for<'t> FnMut(&'t mut Transaction<'static, Postgres>) -> TxFuture<'t, T> + Send,
    T: Send,
{
    type Output = T;
    type Error = sqlx::Error;

    async fn attempt(&mut self) -> Result<T, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        match (self.op)(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn classify(&self, err: &sqlx::Error) -> ErrorClass {
        classify_sqlx_error(err)
    }
}
