//! Row text assembly and fixed-window chunking.
//!
//! The document text for a row is the non-missing cells of the selected
//! text columns, stringified and joined with `" | "`. Text longer than
//! `max_chars` characters is cut into contiguous, non-overlapping windows
//! of exactly `max_chars` characters; the last window may be shorter.
//!
//! # Example
//!
//! ```rust
//! use csv_rag_core::chunk::chunk_text;
//!
//! assert_eq!(chunk_text("abcdefg", 3), vec!["abc", "def", "g"]);
//! assert_eq!(chunk_text("abc", 3), vec!["abc"]);
//! assert!(chunk_text("", 3).is_empty());
//! ```

use crate::models::{ColumnKind, RowRef, Schema};

/// Separator placed between cell values in assembled text.
pub const TEXT_SEPARATOR: &str = " | ";

/// One slice of a row's assembled text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position within the row.
    pub index: usize,
    /// Total chunks the row produced.
    pub count: usize,
    pub text: String,
}

/// Decide which columns contribute to document text.
///
/// Explicit `text_cols` win. Otherwise all columns are used, or with
/// `auto_text_only` only [`ColumnKind::Text`] columns, falling back to all
/// columns when there are none.
pub fn select_text_columns(
    schema: &Schema,
    text_cols: Option<&[String]>,
    auto_text_only: bool,
) -> Vec<String> {
    if let Some(cols) = text_cols {
        return cols.to_vec();
    }
    if auto_text_only {
        let text_only: Vec<String> = schema
            .columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Text)
            .map(|c| c.name.clone())
            .collect();
        if !text_only.is_empty() {
            return text_only;
        }
    }
    schema.names()
}

/// Join the non-missing values of `columns` with [`TEXT_SEPARATOR`].
pub fn assemble_text(row: &RowRef<'_>, columns: &[String]) -> String {
    columns
        .iter()
        .filter_map(|c| row.get(c))
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(TEXT_SEPARATOR)
}

/// Split text into windows of at most `max_chars` characters.
///
/// Empty text yields no chunks. Lengths are counted in Unicode scalar
/// values and cuts always land on char boundaries.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let max_chars = max_chars.max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (pos, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(text[start..pos].to_string());
            start = pos;
            count = 0;
        }
        count += 1;
    }
    chunks.push(text[start..].to_string());
    chunks
}

/// Chunk a row's text, substituting a single empty chunk for empty text
/// so every row maps to at least one document.
pub fn chunk_row_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let mut pieces = chunk_text(text, max_chars);
    if pieces.is_empty() {
        pieces.push(String::new());
    }
    let count = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { index, count, text })
        .collect()
}
