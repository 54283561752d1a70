//! Incremental diffing of freshly computed rows against the destination
//! store's current contents.
//!
//! Comparison is purely by natural-key equality on string-cast key fields:
//! a row whose key already exists in the store is dropped even if other
//! fields changed. Content is never updated in place.

use std::collections::HashSet;

use crate::flatten::{ITEM_INDEX, PARENT_ID, PARENT_TABLE, SUBMISSION_ID};
use crate::model::{StoredTable, Table};

/// Candidate key column sets for the parent table, in priority order.
const PARENT_KEYS: &[&[&str]] = &[&["_id"], &[SUBMISSION_ID]];
/// Candidate key column sets for child tables, in priority order.
const CHILD_KEYS: &[&[&str]] = &[&[PARENT_ID, ITEM_INDEX], &[PARENT_ID]];

/// Picks the natural key for a table: the highest-priority candidate whose
/// columns are present both in the new table and in the stored header. The
/// candidate set follows table identity, so a submission field that happens
/// to be named `parent_id` never reclassifies the parent table. `None` means
/// no usable key exists and every row counts as new.
pub fn select_key(table: &Table, stored_header: &[String]) -> Option<&'static [&'static str]> {
    let candidates = if table.name == PARENT_TABLE {
        PARENT_KEYS
    } else {
        CHILD_KEYS
    };

    candidates
        .iter()
        .find(|key| {
            key.iter().all(|column| {
                table.columns.iter().any(|c| c == column)
                    && stored_header.iter().any(|h| h == column)
            })
        })
        .copied()
}

/// Returns the string rows of `table` whose key is absent from the stored
/// contents, in table order.
pub fn new_rows(table: &Table, stored: &StoredTable) -> Vec<Vec<String>> {
    let Some(key) = select_key(table, &stored.header) else {
        return table.string_rows();
    };

    let positions: Option<Vec<usize>> = key
        .iter()
        .map(|column| stored.header.iter().position(|h| h == column))
        .collect();
    let Some(positions) = positions else {
        return table.string_rows();
    };

    let existing: HashSet<Vec<String>> = stored
        .rows
        .iter()
        .map(|row| {
            positions
                .iter()
                .map(|&index| row.get(index).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    table
        .rows
        .iter()
        .filter(|row| {
            let row_key: Vec<String> = key
                .iter()
                .map(|column| {
                    row.get(*column)
                        .map(|cell| cell.to_string())
                        .unwrap_or_default()
                })
                .collect();
            !existing.contains(&row_key)
        })
        .map(|row| table.string_row(row))
        .collect()
}
