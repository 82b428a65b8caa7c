//! CSV loading.
//!
//! Reads a CSV file with a header row into a typed [`Dataset`]. Bytes that
//! are not valid UTF-8 are decoded as Latin-1 instead, so legacy exports
//! load without manual conversion. Common "not available" tokens become
//! [`CellValue::Missing`], and each column's kind is inferred once from its
//! non-missing cells. Repeated header names get `.1`, `.2` suffixes.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

use csv_rag_core::models::{CellValue, Column, ColumnKind, Dataset, Schema};

/// Cell spellings read as missing.
pub const NA_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "<NA>"];

/// Text encoding a file was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
}

/// Decode bytes as UTF-8 (dropping a BOM), or as Latin-1 if that fails.
pub fn decode(bytes: Vec<u8>) -> (String, Encoding) {
    match String::from_utf8(bytes) {
        Ok(mut s) => {
            if s.starts_with('\u{feff}') {
                s.remove(0);
            }
            (s, Encoding::Utf8)
        }
        // Latin-1 maps every byte to the code point of the same value
        Err(e) => (
            e.into_bytes().iter().map(|&b| b as char).collect(),
            Encoding::Latin1,
        ),
    }
}

/// Load a CSV file from disk.
pub fn load_csv(path: &Path) -> Result<Dataset> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (text, encoding) = decode(bytes);
    if encoding == Encoding::Latin1 {
        tracing::info!(path = %path.display(), "file is not valid UTF-8, decoded as Latin-1");
    }
    parse_csv(&text).with_context(|| format!("Failed to parse CSV {}", path.display()))
}

/// Parse CSV text with a header row.
pub fn parse_csv(text: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Ok(Dataset::default());
    }
    let headers = dedupe_headers(headers);

    let mut raw: Vec<Vec<Option<String>>> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", i + 1))?;
        if record.len() > headers.len() {
            bail!(
                "CSV record {} has {} fields but the header has {}",
                i + 1,
                record.len(),
                headers.len()
            );
        }
        let mut cells: Vec<Option<String>> = record
            .iter()
            .map(|field| (!is_na(field)).then(|| field.to_string()))
            .collect();
        cells.resize(headers.len(), None);
        raw.push(cells);
    }

    let kinds: Vec<ColumnKind> = (0..headers.len())
        .map(|c| {
            let kind = infer_kind(raw.iter().filter_map(|row| row[c].as_deref()));
            // An integer column with gaps is read as floats
            if kind == ColumnKind::Int && raw.iter().any(|row| row[c].is_none()) {
                ColumnKind::Float
            } else {
                kind
            }
        })
        .collect();

    let rows = raw
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&kinds)
                .map(|(cell, kind)| match cell {
                    Some(s) => convert(&s, *kind),
                    None => CellValue::Missing,
                })
                .collect()
        })
        .collect();

    let schema = Schema::new(
        headers
            .into_iter()
            .zip(kinds)
            .map(|(name, kind)| Column { name, kind })
            .collect(),
    );
    Dataset::new(schema, rows)
}

/// Rename repeated header names to `name.1`, `name.2`, ... so every
/// column stays addressable. A generated name that collides with a later
/// or earlier header is bumped again.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    headers
        .into_iter()
        .map(|header| {
            let mut name = header;
            let mut seen = counts.get(&name).copied().unwrap_or(0);
            while seen > 0 {
                counts.insert(name.clone(), seen + 1);
                name = format!("{}.{}", name, seen);
                seen = counts.get(&name).copied().unwrap_or(0);
            }
            counts.insert(name.clone(), seen + 1);
            name
        })
        .collect()
}

fn is_na(field: &str) -> bool {
    NA_TOKENS.contains(&field.trim())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// All bool-like → Bool, all integers → Int, all numeric → Float,
/// anything else (or no values at all) → Text.
fn infer_kind<'a>(values: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    if values.clone().next().is_none() {
        return ColumnKind::Text;
    }
    if values.clone().all(|v| parse_bool(v).is_some()) {
        ColumnKind::Bool
    } else if values.clone().all(|v| v.trim().parse::<i64>().is_ok()) {
        ColumnKind::Int
    } else if values.clone().all(|v| v.trim().parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else {
        ColumnKind::Text
    }
}

fn convert(s: &str, kind: ColumnKind) -> CellValue {
    let parsed = match kind {
        ColumnKind::Bool => parse_bool(s).map(CellValue::Bool),
        ColumnKind::Int => s.trim().parse().ok().map(CellValue::Int),
        ColumnKind::Float => s.trim().parse().ok().map(CellValue::Float),
        ColumnKind::Text => None,
    };
    parsed.unwrap_or_else(|| CellValue::Text(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv_rag_core::chunk::{assemble_text, select_text_columns};
    use csv_rag_core::metadata::project_metadata;

    #[test]
    fn test_parse_typed_columns() {
        let ds = parse_csv("id,text,score,ok\n1,hello world,5,true\n2,bye,7.5,False\n").unwrap();
        let kinds: Vec<ColumnKind> = ds.schema().columns.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Int,
                ColumnKind::Text,
                ColumnKind::Float,
                ColumnKind::Bool
            ]
        );
        let row = ds.rows().next().unwrap();
        assert_eq!(row.get("score"), Some(&CellValue::Float(5.0)));
        assert_eq!(row.get("ok"), Some(&CellValue::Bool(true)));
    }

    #[test]
    fn test_na_tokens_are_missing() {
        let ds = parse_csv("a,b\nNA,x\n,y\n3,<NA>\n").unwrap();
        let rows: Vec<_> = ds.rows().collect();
        assert_eq!(rows[0].get("a"), None);
        assert_eq!(rows[1].get("a"), None);
        assert_eq!(rows[2].get("a"), Some(&CellValue::Float(3.0)));
        assert_eq!(rows[2].get("b"), None);
        assert_eq!(ds.schema().columns[0].kind, ColumnKind::Float);
    }

    #[test]
    fn test_int_column_with_gaps_renders_as_float() {
        let ds = parse_csv("id,n\n1,5\n2,\n").unwrap();
        assert_eq!(ds.schema().columns[0].kind, ColumnKind::Int);
        assert_eq!(ds.schema().columns[1].kind, ColumnKind::Float);
        let row = ds.rows().next().unwrap();
        assert_eq!(row.get("n").map(|v| v.to_string()), Some("5.0".to_string()));
    }

    #[test]
    fn test_repeated_headers_are_renamed() {
        let ds = parse_csv("a,a,b,a\nfirst,second,x,third\n").unwrap();
        assert_eq!(ds.schema().names(), vec!["a", "a.1", "b", "a.2"]);

        let row = ds.rows().next().unwrap();
        let cols = select_text_columns(ds.schema(), None, false);
        let text = assemble_text(&row, &cols);
        assert_eq!(text, "first | second | x | third");

        let meta = project_metadata(&row, &ds.schema().names());
        assert_eq!(meta["a"], "first");
        assert_eq!(meta["a.1"], "second");
        assert_eq!(meta["a.2"], "third");
    }

    #[test]
    fn test_renamed_header_does_not_collide() {
        assert_eq!(
            dedupe_headers(vec!["a".into(), "a".into(), "a.1".into()]),
            vec!["a", "a.1", "a.1.1"]
        );
    }

    #[test]
    fn test_quoted_fields_and_short_rows() {
        let ds = parse_csv("name,note,extra\n\"Smith, J\",\"said \"\"hi\"\"\"\nx\n").unwrap();
        let rows: Vec<_> = ds.rows().collect();
        assert_eq!(rows[0].get("name"), Some(&CellValue::Text("Smith, J".into())));
        assert_eq!(rows[0].get("note"), Some(&CellValue::Text("said \"hi\"".into())));
        assert_eq!(rows[1].get("extra"), None);
    }

    #[test]
    fn test_too_many_fields_is_error() {
        assert!(parse_csv("a\n1,2\n").is_err());
    }

    #[test]
    fn test_header_only_is_empty() {
        let ds = parse_csv("a,b\n").unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.schema().len(), 2);
        assert!(parse_csv("").unwrap().is_empty());
    }

    #[test]
    fn test_latin1_fallback() {
        // "café" in Latin-1
        let bytes = b"name\ncaf\xe9\n".to_vec();
        let (text, enc) = decode(bytes);
        assert_eq!(enc, Encoding::Latin1);
        assert!(text.contains("café"));
    }

    #[test]
    fn test_utf8_bom_dropped() {
        let (text, enc) = decode("\u{feff}a,b\n".as_bytes().to_vec());
        assert_eq!(enc, Encoding::Utf8);
        assert!(text.starts_with("a,b"));
    }

    #[test]
    fn test_load_csv_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        std::fs::write(&path, "id,text\n1,hello\n").unwrap();
        let ds = load_csv(&path).unwrap();
        assert_eq!(ds.len(), 1);
        assert!(load_csv(&tmp.path().join("missing.csv")).is_err());
    }
}
