//! Projection of row cells into document metadata.

use serde_json::Value;

use crate::models::{Metadata, RowRef};

/// Metadata key holding a chunk's zero-based index.
pub const CHUNK_KEY: &str = "_chunk";
/// Metadata key holding the number of chunks the row produced.
pub const CHUNK_COUNT_KEY: &str = "_chunk_count";

/// Map each metadata column to its value; missing cells become `null`
/// and are never dropped.
pub fn project_metadata(row: &RowRef<'_>, columns: &[String]) -> Metadata {
    columns
        .iter()
        .map(|c| {
            let value = row.get(c).map(|v| v.to_json()).unwrap_or(Value::Null);
            (c.clone(), value)
        })
        .collect()
}

/// Add chunk bookkeeping to a chunk's metadata. Rows with a single chunk
/// are left untouched.
pub fn annotate_chunk(metadata: &mut Metadata, index: usize, count: usize) {
    if count > 1 {
        metadata.insert(CHUNK_KEY.to_string(), Value::from(index));
        metadata.insert(CHUNK_COUNT_KEY.to_string(), Value::from(count));
    }
}
