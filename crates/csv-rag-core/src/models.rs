//! Core data models used throughout csv-rag.
//!
//! A [`Dataset`] is a [`Schema`] plus positional rows of [`CellValue`]s.
//! Rows are read through [`RowRef`], whose [`RowRef::get`] is the single
//! place where missing cells are recognised.

use std::fmt;

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Structured metadata attached to a stored document.
pub type Metadata = Map<String, Value>;

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// True for the missing marker and for `NaN` floats.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Convert to a JSON value for metadata. Missing and non-finite
    /// floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Missing => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Int(i) => Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Canonical stringification shared by key derivation and text assembly.
///
/// Missing renders as the empty string; integral floats keep one
/// fractional digit (`5.0`) so they stay distinguishable from ints.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            _ if self.is_missing() => Ok(()),
            CellValue::Bool(true) => write!(f, "True"),
            CellValue::Bool(false) => write!(f, "False"),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Missing => Ok(()),
        }
    }
}

/// Inferred type of a column, decided once per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Bool,
    Int,
    Float,
    Text,
}

impl ColumnKind {
    /// Infer a column kind from typed cells, ignoring missing ones.
    ///
    /// All bools → `Bool`, all ints → `Int`, ints and floats → `Float`,
    /// anything else (including an all-missing column) → `Text`.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> ColumnKind {
        let mut kind: Option<ColumnKind> = None;
        for cell in cells {
            if cell.is_missing() {
                continue;
            }
            let this = match cell {
                CellValue::Bool(_) => ColumnKind::Bool,
                CellValue::Int(_) => ColumnKind::Int,
                CellValue::Float(_) => ColumnKind::Float,
                _ => ColumnKind::Text,
            };
            kind = Some(match (kind, this) {
                (None, k) => k,
                (Some(a), b) if a == b => a,
                (Some(ColumnKind::Int), ColumnKind::Float)
                | (Some(ColumnKind::Float), ColumnKind::Int) => ColumnKind::Float,
                _ => return ColumnKind::Text,
            });
        }
        kind.unwrap_or(ColumnKind::Text)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered column descriptors for a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Column names in dataset order.
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// An immutable table of rows sharing one [`Schema`].
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Build a dataset, checking that every row matches the schema width.
    pub fn new(schema: Schema, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                bail!(
                    "row {} has {} cells but the schema has {} columns",
                    i,
                    row.len(),
                    schema.len()
                );
            }
        }
        Ok(Self { schema, rows })
    }

    /// Build a dataset from column names and typed rows, inferring each
    /// column's kind from its values.
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let schema = Schema::new(
            columns
                .iter()
                .enumerate()
                .map(|(i, name)| Column {
                    name: name.to_string(),
                    kind: ColumnKind::infer(rows.iter().filter_map(|r| r.get(i))),
                })
                .collect(),
        );
        Self::new(schema, rows)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows in dataset order.
    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |cells| RowRef {
            schema: &self.schema,
            cells,
        })
    }
}

/// Borrowed view of one row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    schema: &'a Schema,
    cells: &'a [CellValue],
}

impl<'a> RowRef<'a> {
    /// Look up a cell by column name.
    ///
    /// Returns `None` when the column does not exist or the cell is
    /// missing; this is the only row accessor the assembler and the
    /// projector use.
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        let cells = self.cells;
        self.schema
            .index_of(column)
            .and_then(|i| cells.get(i))
            .filter(|c| !c.is_missing())
    }

    /// All cells in column order, missing ones included.
    pub fn values(&self) -> impl Iterator<Item = &'a CellValue> {
        self.cells.iter()
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }
}
