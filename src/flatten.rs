//! Flattens raw submissions into a parent table plus one child table per
//! nested field.
//!
//! The parent table keeps every source field as a column, with nested lists
//! and objects serialised to canonical JSON strings. Each field that holds a
//! nested value in at least one record additionally produces a child table:
//! one row per list element (keyed by `parent_id` and `item_index`) or a
//! single row per object value (keyed by `parent_id` alone).

use std::collections::BTreeSet;

use serde_json::Value;

use crate::model::{CellValue, Record, Row, TableBuilder, TableSet};

/// Name of the parent table holding one row per submission.
pub const PARENT_TABLE: &str = "Main";
/// Column carrying the derived submission identifier on the parent table.
pub const SUBMISSION_ID: &str = "submission_id";
/// Column referencing the parent record's identifier on child tables.
pub const PARENT_ID: &str = "parent_id";
/// Column carrying the element position for list-derived child rows.
pub const ITEM_INDEX: &str = "item_index";
/// Column holding scalar list elements that have no keys of their own.
pub const VALUE_COLUMN: &str = "value";

/// Builds the full table set for a batch of records. Row order follows the
/// source batch (record order, then element order), so identical batches
/// produce identical table sets.
pub fn build_tables(records: &[Record]) -> TableSet {
    let mut parent = TableBuilder::new();
    let mut nested_fields: BTreeSet<String> = BTreeSet::new();

    for (ordinal, record) in records.iter().enumerate() {
        parent.push(normalize_record(record, ordinal, &mut nested_fields));
    }

    let mut tables = vec![parent.into_table(PARENT_TABLE.to_string(), &["_id", SUBMISSION_ID])];

    for field in &nested_fields {
        let mut child = TableBuilder::new();
        for (ordinal, record) in records.iter().enumerate() {
            let parent_id = record_identifier(record, ordinal);
            match record.get(field) {
                Some(Value::Array(elements)) => {
                    for (index, element) in elements.iter().enumerate() {
                        child.push(list_element_row(&parent_id, index, element));
                    }
                }
                Some(Value::Object(object)) => {
                    child.push(object_row(&parent_id, object));
                }
                _ => {}
            }
        }
        if !child.is_empty() {
            tables.push(child.into_table(
                format!("{PARENT_TABLE}_{field}"),
                &[PARENT_ID, ITEM_INDEX],
            ));
        }
    }

    TableSet { tables }
}

/// Turns one record into a parent-table row. Nested values are serialised in
/// place and their field names flagged for child-table construction. The
/// derived `submission_id` column is always present: a copy of `_id` when the
/// record carries one, the batch ordinal otherwise.
fn normalize_record(record: &Record, ordinal: usize, nested_fields: &mut BTreeSet<String>) -> Row {
    let mut row = Row::new();
    for (field, value) in record {
        if value.is_array() || value.is_object() {
            nested_fields.insert(field.clone());
        }
        row.insert(field.clone(), CellValue::from_json(value));
    }
    row.insert(SUBMISSION_ID.to_string(), record_identifier(record, ordinal));
    row
}

/// The record's stable identifier: its `_id` field when present, otherwise
/// the ordinal the source assigned it within the batch.
fn record_identifier(record: &Record, ordinal: usize) -> CellValue {
    record
        .get("_id")
        .map(CellValue::from_json)
        .unwrap_or(CellValue::Number(ordinal as f64))
}

fn list_element_row(parent_id: &CellValue, index: usize, element: &Value) -> Row {
    let mut row = Row::new();
    row.insert(PARENT_ID.to_string(), parent_id.clone());
    row.insert(ITEM_INDEX.to_string(), CellValue::Number(index as f64));
    match element {
        Value::Object(object) => {
            for (key, value) in object {
                row.insert(key.clone(), CellValue::from_json(value));
            }
        }
        // Scalar elements, and malformed elements such as nested lists, land
        // in the fixed value column (best-effort scalar, never a dropped row).
        other => {
            row.insert(VALUE_COLUMN.to_string(), CellValue::from_json(other));
        }
    }
    row
}

fn object_row(parent_id: &CellValue, object: &Record) -> Row {
    let mut row = Row::new();
    row.insert(PARENT_ID.to_string(), parent_id.clone());
    for (key, value) in object {
        row.insert(key.clone(), CellValue::from_json(value));
    }
    row
}
