//! Row explosion for multi-value "employee list" fields.
//!
//! Some string fields encode several logical values as whitespace-separated
//! tokens (crew tickets, harvest operator lists). Any column whose name
//! contains one of the configured patterns is treated as multi-value: rows
//! holding more than one token are replaced by one copy per token, the
//! matching column set to the single token and every other field copied
//! unchanged. The pass is idempotent, since a single token contains no
//! interior whitespace.

use crate::model::{CellValue, Table, TableSet};

/// Default patterns matched (case-sensitive, substring) against column names.
pub fn default_patterns() -> Vec<String> {
    ["TiqueteCajon", "TiqueteCable", "OperariosCosecha"]
        .map(String::from)
        .to_vec()
}

/// Applies the expansion to every table in the set. The pass runs after
/// child tables are built, so it covers multi-value fields both at the top
/// level of a submission and nested inside list/object fields.
pub fn expand_tables(set: TableSet, patterns: &[String]) -> TableSet {
    TableSet {
        tables: set
            .tables
            .into_iter()
            .map(|table| expand_table(table, patterns))
            .collect(),
    }
}

fn expand_table(table: Table, patterns: &[String]) -> Table {
    let Table {
        name,
        columns,
        mut rows,
    } = table;
    let multi_value: Vec<String> = columns
        .iter()
        .filter(|column| patterns.iter().any(|pattern| column.contains(pattern)))
        .cloned()
        .collect();
    // Columns are expanded in sequence: two multi-value columns on one table
    // replicate multiplicatively.
    for column in &multi_value {
        let mut expanded = Vec::with_capacity(rows.len());
        for row in rows {
            match split_tokens(row.get(column.as_str())) {
                Some(tokens) => {
                    for token in tokens {
                        let mut copy = row.clone();
                        copy.insert(column.clone(), CellValue::Text(token));
                        expanded.push(copy);
                    }
                }
                None => expanded.push(row),
            }
        }
        rows = expanded;
    }

    Table {
        name,
        columns,
        rows,
    }
}

/// Returns the whitespace-separated tokens of a cell when it holds a string
/// with more than one of them; `None` means the row passes through unchanged.
fn split_tokens(cell: Option<&CellValue>) -> Option<Vec<String>> {
    let CellValue::Text(text) = cell? else {
        return None;
    };
    let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    (tokens.len() > 1).then_some(tokens)
}
