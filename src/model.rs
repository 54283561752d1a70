use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;

/// One raw survey submission as returned by the source feed: an open mapping
/// of field name to scalar, nested list, or nested object.
pub type Record = serde_json::Map<String, Value>;

/// A single cell of an output table. Nested values never appear here; they
/// are either serialised to JSON text or exploded into child-table rows
/// before a cell is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Missing or null value, rendered as an empty string.
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Converts an arbitrary JSON value into a cell. Lists and objects are
    /// serialised to their canonical JSON string; non-finite numbers are
    /// normalised to [`CellValue::Empty`] rather than producing
    /// unrepresentable output.
    pub fn from_json(value: &Value) -> CellValue {
        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(flag) => CellValue::Bool(*flag),
            Value::Number(number) => number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(CellValue::Number)
                .unwrap_or(CellValue::Empty),
            Value::String(text) => CellValue::Text(text.clone()),
            nested => CellValue::Text(serialize_nested(nested)),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(flag) => write!(f, "{flag}"),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Serialises a nested list or object to its canonical JSON string, falling
/// back to the debug-free `Value` rendering if serialization fails.
pub fn serialize_nested(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// A single table row. Missing columns render as empty strings when the row
/// is materialised against its table's column set.
pub type Row = BTreeMap<String, CellValue>;

/// A flat table destined for one spreadsheet sheet. `columns` carries the
/// deterministic output order: key columns first, the remaining column union
/// in sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Renders one row as strings aligned to the table's column order.
    pub fn string_row(&self, row: &Row) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| {
                row.get(column)
                    .map(|cell| cell.to_string())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Renders all rows as strings aligned to the table's column order.
    pub fn string_rows(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(|row| self.string_row(row)).collect()
    }
}

/// Accumulates rows for one table, tracking the column union as rows arrive.
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: BTreeSet<String>,
    rows: Vec<Row>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: Row) {
        for column in row.keys() {
            if !self.columns.contains(column) {
                self.columns.insert(column.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Finalises the table. Columns listed in `leading` come first (in the
    /// given order, skipping any that never appeared), followed by the rest
    /// of the union in sorted order.
    pub fn into_table(self, name: String, leading: &[&str]) -> Table {
        let mut columns = Vec::with_capacity(self.columns.len());
        for column in leading {
            if self.columns.contains(*column) {
                columns.push((*column).to_string());
            }
        }
        columns.extend(
            self.columns
                .iter()
                .filter(|column| !leading.contains(&column.as_str()))
                .cloned(),
        );

        Table {
            name,
            columns,
            rows: self.rows,
        }
    }
}

/// All tables produced by one run: the parent table first, child tables in
/// name order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSet {
    pub tables: Vec<Table>,
}

impl TableSet {
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }
}

/// The destination store's current contents for one table: the header row
/// and the data rows below it, all string-cast.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}
