//! Orchestration of one synchronisation run.
//!
//! The engine drives the pipeline fetch → flatten → expand → local export →
//! per-table incremental sync. Tables sync independently: a store failure on
//! one table is logged and recorded, and the remaining tables still run.

use std::fmt;

use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::model::{Record, StoredTable, Table, TableSet};
use crate::names::{REMOTE_NAME_MAX, sanitize_name};
use crate::{diff, expand, flatten};

/// Source of raw submissions. Implementations walk pagination internally and
/// return the complete batch.
pub trait SourceFeed {
    fn fetch_all(&self) -> Result<Vec<Record>>;
}

/// Result of looking a table up in the destination store.
#[derive(Debug, Clone, PartialEq)]
pub enum TableLookup {
    Found(StoredTable),
    NotFound,
}

/// The destination store's append-only table interface. Deduplication is
/// entirely the caller's responsibility; the store must preserve row order
/// and never drop rows on its side.
pub trait Store {
    fn read_table(&self, name: &str) -> Result<TableLookup>;
    fn create_table(&self, name: &str, header: &[String]) -> Result<()>;
    fn append_rows(&self, name: &str, rows: &[Vec<String>]) -> Result<()>;
}

/// Local artifact writer receiving the full, non-diffed table set.
pub trait LocalExport {
    fn write(&self, tables: &TableSet) -> Result<()>;
}

/// Terminal outcome of one table's sync.
#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome {
    /// The table did not exist; it was created and all rows written.
    Created(usize),
    /// The table existed; this many new rows were appended.
    Appended(usize),
    /// The table existed and held every computed row already.
    NoOp,
    /// The table's sync aborted; other tables are unaffected.
    Failed(String),
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableOutcome::Created(count) => write!(f, "created ({count} rows)"),
            TableOutcome::Appended(count) => write!(f, "appended {count} rows"),
            TableOutcome::NoOp => write!(f, "no new rows"),
            TableOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Per-table summary of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, TableOutcome)>,
}

/// Executes one full run. An empty batch is not an error: the run ends with
/// an empty report after logging that there is nothing to do.
#[instrument(skip_all)]
pub fn run(
    feed: &dyn SourceFeed,
    store: &dyn Store,
    export: &dyn LocalExport,
    multi_value_patterns: &[String],
) -> Result<RunReport> {
    let records = feed.fetch_all()?;
    if records.is_empty() {
        info!("feed returned no submissions, nothing to do");
        return Ok(RunReport::default());
    }
    info!(record_count = records.len(), "fetched submissions");

    let tables = flatten::build_tables(&records);
    let tables = expand::expand_tables(tables, multi_value_patterns);
    info!(table_count = tables.tables.len(), "table set built");

    export.write(&tables)?;

    let mut report = RunReport::default();
    for table in &tables.tables {
        let outcome = match sync_table(store, table) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(table = %table.name, error = %error, "table sync failed");
                TableOutcome::Failed(error.to_string())
            }
        };
        info!(table = %table.name, outcome = %outcome, "table synced");
        report.outcomes.push((table.name.clone(), outcome));
    }

    Ok(report)
}

/// Syncs one table: reads the store's current contents, diffs by natural
/// key, and appends only the missing rows. A missing table is created with
/// the current header before appending.
fn sync_table(store: &dyn Store, table: &Table) -> Result<TableOutcome> {
    let name = sanitize_name(&table.name, REMOTE_NAME_MAX);
    match store.read_table(&name)? {
        TableLookup::NotFound => {
            store.create_table(&name, &table.columns)?;
            let rows = table.string_rows();
            if !rows.is_empty() {
                store.append_rows(&name, &rows)?;
            }
            Ok(TableOutcome::Created(rows.len()))
        }
        TableLookup::Found(stored) => {
            let rows = diff::new_rows(table, &stored);
            if rows.is_empty() {
                Ok(TableOutcome::NoOp)
            } else {
                store.append_rows(&name, &rows)?;
                Ok(TableOutcome::Appended(rows.len()))
            }
        }
    }
}
