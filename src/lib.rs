//! # Changefeed Indexer
//!
//! Projects a database changefeed onto a search document store.
//!
//! The source database (CockroachDB, or anything speaking its changefeed
//! file format) pushes newline-delimited JSON batches over HTTP. Delivery is
//! at-least-once and may repeat or reorder events, so every event is applied
//! idempotently: the document id is a pure function of the row key, upserts
//! replace whole documents, and deleting a missing document succeeds.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  PUT   ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │ Changefeed │──────▶│  server  │──▶│  ingest  │──▶│  project  │──▶ DocumentStore
//! └────────────┘        └──────────┘   │ address  │   │  doc_id   │
//!       ▲                              │ decode   │   └───────────┘
//!       │                              └──────────┘
//! ┌────────────┐  txn   ┌──────────┐
//! │  docs table│◀──────│ indexer  │  (retry executor: txn)
//! └────────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cfi init                        # create the docs table
//! cfi create-index defaultdb      # provision the search index
//! cfi serve                       # start the changefeed sink
//! cfi index https://example.com   # fetch a page into docs
//! cfi search some phrase          # phrase search with highlights
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`address`] | Changefeed file name → table address |
//! | [`doc_id`] | Row key → document id |
//! | [`decode`] | NDJSON batch decoding |
//! | [`project`] | Idempotent upsert/delete |
//! | [`ingest`] | Batch orchestration |
//! | [`store`] | Document store trait, Elasticsearch and in-memory backends |
//! | [`txn`] | Retryable transaction executor |
//! | [`server`] | HTTP sink |
//! | [`indexer`] | Page fetch → `docs` insert |
//! | [`extract`] | HTML text extraction |

pub mod address;
pub mod config;
pub mod db;
pub mod decode;
pub mod doc_id;
pub mod error;
pub mod extract;
pub mod indexer;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod project;
pub mod provision;
pub mod search;
pub mod server;
pub mod store;
pub mod txn;
