//! Error types for the ingestion and write paths.
//!
//! Request-level failures ([`IngestError`]) abort a whole batch. Store
//! failures ([`StoreError`]) are per event and only counted. Transaction
//! failures ([`TxnError`]) come out of the retry executor once it gives up.

use thiserror::Error;

/// Failures that reject an entire inbound batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("address token does not match <prefix>-<db>.<schema>.<table>-<seq>.<ext>: {token}")]
    MalformedAddress { token: String },

    #[error("malformed record on line {line_number}: {reason}: {line}")]
    MalformedRecord {
        line_number: usize,
        line: String,
        reason: String,
    },

    #[error("row key must have at least one component")]
    InvalidKey,
}

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store rejected credentials (401); check store.user and the password env var")]
    Unauthorized,

    #[error("store answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// Per-event failure inside a batch. Never aborts the batch.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    InvalidKey(#[from] IngestError),

    #[error("store write failed: {0}")]
    StoreWriteFailed(#[from] StoreError),
}

/// Terminal failures of the retry executor.
#[derive(Debug, Error)]
pub enum TxnError<E: std::error::Error + 'static> {
    #[error("transaction did not succeed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("non-retryable error on attempt {attempt}: {source}")]
    NonRetryable {
        attempt: u32,
        #[source]
        source: E,
    },
}

impl<E: std::error::Error + 'static> TxnError<E> {
    /// Number of attempts made before the executor stopped.
    pub fn attempts(&self) -> u32 {
        match self {
            TxnError::RetriesExhausted { attempts, .. } => *attempts,
            TxnError::NonRetryable { attempt, .. } => *attempt,
        }
    }

    pub fn into_source(self) -> E {
        match self {
            TxnError::RetriesExhausted { source, .. } | TxnError::NonRetryable { source, .. } => {
                source
            }
        }
    }
}
