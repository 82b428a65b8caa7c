//! # csv-rag
//!
//! Turn CSV rows into searchable vector-store documents and query them by
//! semantic similarity, all in a local SQLite file.
//!
//! Each row becomes one or more documents with deterministic ids, so
//! re-ingesting the same file overwrites instead of duplicating. The pure
//! pipeline lives in [`csv_rag_core`]; this crate adds configuration, CSV
//! loading, the SQLite store, embedding providers, and the `csvrag` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────┐
//! │ CSV file │──▶│ csv-rag-core upsert  │──▶│  SQLite  │
//! │ (loader) │   │ key+chunk+meta+embed │   │ vectors  │
//! └──────────┘   └──────────────────────┘   └────┬─────┘
//!                                                │
//!                                                ▼
//!                                          ┌──────────┐
//!                                          │  query   │
//!                                          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! csvrag init
//! csvrag ingest reviews.csv --namespace reviews --id-col review_id
//! csvrag query reviews "late delivery" -k 3
//! csvrag stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`dataset`] | CSV loading with encoding fallback |
//! | [`embedding`] | Embedding providers |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`ingest`] | `ingest` command |
//! | [`search`] | `query` command |
//! | [`get`] | `get` command |
//! | [`stats`] | `stats` command |
//! | [`progress`] | Ingest progress on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod config;
pub mod dataset;
pub mod db;
pub mod embedding;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod sqlite_store;
pub mod stats;
