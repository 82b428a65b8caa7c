//! # csv-rag core
//!
//! Pure logic for turning tabular rows into searchable vector-store
//! documents: the row model, deterministic id derivation, text assembly
//! and chunking, metadata projection, the [`store::VectorStore`] and
//! [`embedding::Embedder`] seams, the batched upsert pipeline, and the
//! best-effort query helper.
//!
//! This crate performs no filesystem or network I/O of its own. The
//! application crate supplies datasets, a persistent store, and concrete
//! embedding providers.
//!
//! ## Data flow
//!
//! ```text
//! Dataset ─▶ per row: key + text/chunks + metadata ─▶ buffer
//!        ─▶ (batch_size reached) Embedder::embed ─▶ VectorStore::upsert
//! ```

pub mod chunk;
pub mod embedding;
pub mod filter;
pub mod key;
pub mod metadata;
pub mod models;
pub mod query;
pub mod store;
pub mod upsert;

pub use models::{CellValue, ColumnKind, Dataset, Metadata, RowRef, Schema};
