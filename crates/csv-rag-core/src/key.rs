//! Deterministic document identifiers.
//!
//! A row is reduced to a canonical string key, the key is MD5-hashed,
//! and the hex digest is prefixed with a caller-supplied string. Two key
//! formats exist and both are stable:
//!
//! - **id columns given**: the id-column values joined with `|`, plus
//!   `|<chunk_index>` only when the row produced more than one chunk, so
//!   single-chunk rows keep the same id as [`stable_id`].
//! - **no id columns**: every column value joined with `|`, always
//!   followed by `|chunk:<i>`. Using all columns keeps rows that differ
//!   only outside the text columns apart.
//!
//! # Example
//!
//! ```rust
//! use csv_rag_core::key::stable_id;
//! use csv_rag_core::models::Dataset;
//!
//! let ds = Dataset::from_rows(&["id", "text"], vec![vec!["1".into(), "hi".into()]]).unwrap();
//! let row = ds.rows().next().unwrap();
//! let id = stable_id(&row, Some(&["id".to_string()][..]), "x-");
//! assert_eq!(id, "x-c4ca4238a0b923820dcc509a6f75849b");
//! ```

use md5::{Digest, Md5};

use crate::models::RowRef;

/// Separator between key parts.
pub const KEY_SEPARATOR: &str = "|";

fn id_columns(id_cols: Option<&[String]>) -> Option<&[String]> {
    id_cols.filter(|cols| !cols.is_empty())
}

/// Build the canonical key for a row.
///
/// Uses the id columns when given (absent or missing cells render as the
/// empty string), otherwise every column in dataset order. A chunk index,
/// when supplied, is appended as a final part.
pub fn row_key(row: &RowRef<'_>, id_cols: Option<&[String]>, chunk_index: Option<usize>) -> String {
    let mut parts: Vec<String> = match id_columns(id_cols) {
        Some(cols) => cols
            .iter()
            .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default())
            .collect(),
        None => row.values().map(|v| v.to_string()).collect(),
    };
    if let Some(i) = chunk_index {
        parts.push(i.to_string());
    }
    parts.join(KEY_SEPARATOR)
}

/// Key used when no id columns are configured: all values plus an
/// explicit `chunk:<i>` marker.
pub fn fallback_key(row: &RowRef<'_>, chunk_index: usize) -> String {
    let values: Vec<String> = row.values().map(|v| v.to_string()).collect();
    format!("{}{}chunk:{}", values.join(KEY_SEPARATOR), KEY_SEPARATOR, chunk_index)
}

/// Hash a key into a prefixed identifier.
pub fn hash_key(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, hex::encode(Md5::digest(key.as_bytes())))
}

/// Deterministic id for a whole row, without any chunk component.
pub fn stable_id(row: &RowRef<'_>, id_cols: Option<&[String]>, prefix: &str) -> String {
    hash_key(prefix, &row_key(row, id_cols, None))
}

/// Id for chunk `chunk_index` of a row that produced `chunk_count` chunks.
pub fn document_id(
    row: &RowRef<'_>,
    id_cols: Option<&[String]>,
    prefix: &str,
    chunk_index: usize,
    chunk_count: usize,
) -> String {
    match id_columns(id_cols) {
        Some(cols) => {
            let index = (chunk_count > 1).then_some(chunk_index);
            hash_key(prefix, &row_key(row, Some(cols), index))
        }
        None => hash_key(prefix, &fallback_key(row, chunk_index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, Dataset};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Dataset {
        Dataset::from_rows(
            &["id", "text", "score"],
            vec![
                vec!["1".into(), "hello world".into(), CellValue::Int(5)],
                vec!["2".into(), "hello world".into(), CellValue::Int(5)],
                vec!["1".into(), "hello world".into(), CellValue::Int(6)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_row_key_with_id_columns() {
        let ds = sample();
        let row = ds.rows().next().unwrap();
        let id_cols = cols(&["id", "score"]);
        assert_eq!(row_key(&row, Some(id_cols.as_slice()), None), "1|5");
        assert_eq!(row_key(&row, Some(id_cols.as_slice()), Some(2)), "1|5|2");
    }

    #[test]
    fn test_row_key_all_columns() {
        let ds = sample();
        let row = ds.rows().next().unwrap();
        assert_eq!(row_key(&row, None, None), "1|hello world|5");
        assert_eq!(row_key(&row, Some(&[][..]), None), "1|hello world|5");
    }

    #[test]
    fn test_fallback_key_has_chunk_marker() {
        let ds = sample();
        let row = ds.rows().next().unwrap();
        assert_eq!(fallback_key(&row, 0), "1|hello world|5|chunk:0");
    }

    #[test]
    fn test_missing_id_cell_renders_empty() {
        let ds = Dataset::from_rows(&["a", "b"], vec![vec![CellValue::Missing, "x".into()]]).unwrap();
        let row = ds.rows().next().unwrap();
        assert_eq!(row_key(&row, Some(cols(&["a", "b", "zz"]).as_slice()), None), "|x|");
    }

    #[test]
    fn test_known_md5() {
        assert_eq!(hash_key("x-", "1"), "x-c4ca4238a0b923820dcc509a6f75849b");
        assert_eq!(hash_key("", ""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_single_chunk_id_matches_stable_id() {
        let ds = sample();
        let row = ds.rows().next().unwrap();
        let id_cols = cols(&["id"]);
        assert_eq!(
            document_id(&row, Some(id_cols.as_slice()), "p-", 0, 1),
            stable_id(&row, Some(id_cols.as_slice()), "p-")
        );
        assert_ne!(
            document_id(&row, Some(id_cols.as_slice()), "p-", 0, 2),
            document_id(&row, Some(id_cols.as_slice()), "p-", 1, 2)
        );
    }

    #[test]
    fn test_id_ignores_unrelated_columns() {
        let ds = sample();
        let rows: Vec<_> = ds.rows().collect();
        let id_cols = cols(&["id"]);
        // rows 0 and 2 differ only in `score`
        assert_eq!(
            document_id(&rows[0], Some(id_cols.as_slice()), "", 0, 1),
            document_id(&rows[2], Some(id_cols.as_slice()), "", 0, 1)
        );
        assert_ne!(
            document_id(&rows[0], Some(id_cols.as_slice()), "", 0, 1),
            document_id(&rows[1], Some(id_cols.as_slice()), "", 0, 1)
        );
    }

    #[test]
    fn test_fallback_distinguishes_non_text_columns() {
        let ds = sample();
        let rows: Vec<_> = ds.rows().collect();
        assert_ne!(
            document_id(&rows[0], None, "", 0, 1),
            document_id(&rows[2], None, "", 0, 1)
        );
        assert_eq!(
            document_id(&rows[0], None, "s-", 0, 1),
            hash_key("s-", "1|hello world|5|chunk:0")
        );
    }
}
