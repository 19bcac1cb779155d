//! Batch ingestion orchestration.
//!
//! Coordinates one inbound changefeed file: address resolution → decoding →
//! per-event projection. Decoding is all-or-nothing; projection is
//! best-effort, so a failing event is logged and counted while the rest of
//! the batch still drains. There is no batch-level rollback.

use std::sync::Arc;

use tracing::{info, warn};

use crate::address;
use crate::config::{IngestConfig, UnmatchedAddressPolicy};
use crate::decode::decode;
use crate::error::IngestError;
use crate::models::IngestSummary;
use crate::project::{Applied, Projector};
use crate::store::DocumentStore;

/// Entry point for addressed changefeed batches.
pub struct IngestService {
    projector: Projector,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(store: Arc<dyn DocumentStore>, config: IngestConfig) -> Self {
        Self {
            projector: Projector::new(store),
            config,
        }
    }

    /// Ingests one batch named by `token`.
    ///
    /// # Errors
    ///
    /// - [`IngestError::MalformedAddress`] when `token` does not resolve and
    ///   the policy is [`UnmatchedAddressPolicy::Reject`].
    /// - [`IngestError::MalformedRecord`] when any line fails to decode. Nothing
    ///   from the batch is applied in that case.
    pub async fn ingest(&self, token: &str, batch: &[u8]) -> Result<IngestSummary, IngestError> {
        let address = match address::resolve(token, &self.config.extension) {
            Ok(address) => address,
            Err(err) => match self.config.unmatched_address {
                UnmatchedAddressPolicy::Ignore => {
                    warn!(token, "ignoring batch with unrecognised name");
                    return Ok(IngestSummary::ignored());
                }
                UnmatchedAddressPolicy::Reject => return Err(err),
            },
        };

        let events = decode(batch, &address)?;
        let mut summary = IngestSummary {
            events: events.len(),
            ..IngestSummary::default()
        };

        for (seq, event) in events.iter().enumerate() {
            match self.projector.apply(event, &address).await {
                Ok((applied, outcome)) => {
                    match applied {
                        Applied::Upserted => summary.upserted += 1,
                        Applied::Deleted => summary.deleted += 1,
                        Applied::AlreadyAbsent => summary.absent += 1,
                    }
                    info!(
                        table = %address,
                        seq,
                        status = outcome.status,
                        updated = event.updated.as_deref().unwrap_or(""),
                        response = %outcome.body.as_ref().map(|b| b.to_string()).unwrap_or_default(),
                        "applied change"
                    );
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(table = %address, seq, key = ?event.row_key, error = %err, "change not applied");
                }
            }
        }

        info!(
            table = %address,
            events = summary.events,
            upserted = summary.upserted,
            deleted = summary.deleted,
            absent = summary.absent,
            failed = summary.failed,
            "batch ingested"
        );
        summary.address = Some(address);
        Ok(summary)
    }
}
