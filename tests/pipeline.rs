use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use kobosync::expand::{default_patterns, expand_tables};
use kobosync::flatten::build_tables;
use kobosync::model::{CellValue, Record, Row, StoredTable, Table, TableSet};
use kobosync::sync::{
    self, LocalExport, RunReport, SourceFeed, Store, TableLookup, TableOutcome,
};
use kobosync::{Result, SyncError, diff};
use serde_json::json;

fn record(value: serde_json::Value) -> Record {
    value
        .as_object()
        .cloned()
        .expect("record literal must be an object")
}

fn text_row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), CellValue::Text(value.to_string())))
        .collect()
}

#[test]
fn nested_list_produces_parent_and_child_tables() {
    let crew = json!([
        {"name": "a", "qty": 1},
        {"name": "b", "qty": 2},
        {"name": "c", "qty": 3}
    ]);
    let records = vec![
        record(json!({"Farm": "El Roble", "F": crew.clone()})),
        record(json!({"Farm": "La Meseta"})),
    ];

    let tables = build_tables(&records);
    let main = tables.get("Main").expect("parent table");
    assert_eq!(main.rows.len(), 2);
    assert_eq!(main.columns[0], "submission_id");

    let rows = main.string_rows();
    let f_index = main
        .columns
        .iter()
        .position(|column| column == "F")
        .expect("F column");
    assert_eq!(rows[0][0], "0");
    assert_eq!(rows[1][0], "1");
    assert_eq!(
        rows[0][f_index],
        serde_json::to_string(&crew).expect("serialised list")
    );
    assert_eq!(rows[1][f_index], "");

    let child = tables.get("Main_F").expect("child table");
    assert_eq!(&child.columns[..2], ["parent_id", "item_index"]);
    let child_rows = child.string_rows();
    assert_eq!(child_rows.len(), 3);
    for (index, child_row) in child_rows.iter().enumerate() {
        assert_eq!(child_row[0], "0");
        assert_eq!(child_row[1], index.to_string());
    }
}

#[test]
fn flattening_is_deterministic() {
    let records = vec![
        record(json!({"_id": 10, "group": {"leader": "Maria", "size": 4}})),
        record(json!({"_id": 11, "group": {"leader": "Jorge"}, "plots": [1, 2]})),
    ];

    let first = build_tables(&records);
    let second = build_tables(&records);
    assert_eq!(first, second);

    let first_rows: Vec<_> = first.tables.iter().map(Table::string_rows).collect();
    let second_rows: Vec<_> = second.tables.iter().map(Table::string_rows).collect();
    assert_eq!(first_rows, second_rows);
}

#[test]
fn object_fields_become_single_child_rows() {
    let records = vec![record(json!({
        "_id": 7,
        "group": {"leader": "Maria", "size": 4}
    }))];

    let tables = build_tables(&records);
    let child = tables.get("Main_group").expect("child table");
    assert_eq!(child.rows.len(), 1);
    assert_eq!(child.columns[0], "parent_id");
    assert!(!child.columns.iter().any(|column| column == "item_index"));

    let row = &child.string_rows()[0];
    let leader = child
        .columns
        .iter()
        .position(|column| column == "leader")
        .expect("leader column");
    assert_eq!(row[0], "7");
    assert_eq!(row[leader], "Maria");
}

#[test]
fn malformed_list_elements_become_value_cells() {
    let records = vec![record(json!({
        "_id": 1,
        "F": ["plain", ["nested", "list"], 42]
    }))];

    let tables = build_tables(&records);
    let child = tables.get("Main_F").expect("child table");
    let value = child
        .columns
        .iter()
        .position(|column| column == "value")
        .expect("value column");

    let rows = child.string_rows();
    assert_eq!(rows[0][value], "plain");
    assert_eq!(rows[1][value], r#"["nested","list"]"#);
    assert_eq!(rows[2][value], "42");
}

#[test]
fn null_and_missing_values_render_empty() {
    let records = vec![
        record(json!({"_id": 1, "nota": null})),
        record(json!({"_id": 2})),
    ];

    let tables = build_tables(&records);
    let main = tables.get("Main").expect("parent table");
    let nota = main
        .columns
        .iter()
        .position(|column| column == "nota")
        .expect("nota column");
    let rows = main.string_rows();
    assert_eq!(rows[0][nota], "");
    assert_eq!(rows[1][nota], "");
}

#[test]
fn employee_list_expansion_splits_tokens() {
    let records = vec![record(json!({
        "_id": 3,
        "Finca": "El Roble",
        "OperariosCosecha": "Ana Luis"
    }))];

    let tables = expand_tables(build_tables(&records), &default_patterns());
    let main = tables.get("Main").expect("parent table");
    assert_eq!(main.rows.len(), 2);

    let operator = main
        .columns
        .iter()
        .position(|column| column == "OperariosCosecha")
        .expect("operator column");
    let farm = main
        .columns
        .iter()
        .position(|column| column == "Finca")
        .expect("farm column");

    let rows = main.string_rows();
    assert_eq!(rows[0][operator], "Ana");
    assert_eq!(rows[1][operator], "Luis");
    // Every other field is copied unchanged into each expanded row.
    assert_eq!(rows[0][farm], rows[1][farm]);
    assert_eq!(rows[0][0], rows[1][0]);
}

#[test]
fn expansion_reaches_nested_child_rows() {
    let records = vec![record(json!({
        "_id": 4,
        "cuadrilla": [{"TiqueteCajon": "Pedro Juana", "lote": "A"}]
    }))];

    let tables = expand_tables(build_tables(&records), &default_patterns());
    let child = tables.get("Main_cuadrilla").expect("child table");
    assert_eq!(child.rows.len(), 2);

    let ticket = child
        .columns
        .iter()
        .position(|column| column == "TiqueteCajon")
        .expect("ticket column");
    let rows = child.string_rows();
    assert_eq!(rows[0][ticket], "Pedro");
    assert_eq!(rows[1][ticket], "Juana");
    assert_eq!(rows[0][0], rows[1][0]);
    assert_eq!(rows[0][1], rows[1][1]);
}

#[test]
fn expansion_is_idempotent() {
    let records = vec![
        record(json!({"_id": 1, "OperariosCosecha": "Ana Luis Carlos"})),
        record(json!({"_id": 2, "OperariosCosecha": "Solo"})),
        record(json!({"_id": 3, "Comentario": "left untouched even with spaces"})),
    ];

    let once = expand_tables(build_tables(&records), &default_patterns());
    let twice = expand_tables(once.clone(), &default_patterns());
    assert_eq!(once, twice);

    let main = once.get("Main").expect("parent table");
    assert_eq!(main.rows.len(), 5);
}

#[test]
fn single_token_rows_pass_through_unchanged() {
    let records = vec![record(json!({"_id": 1, "OperariosCosecha": "Ana"}))];
    let tables = expand_tables(build_tables(&records), &default_patterns());
    let main = tables.get("Main").expect("parent table");
    assert_eq!(main.rows.len(), 1);
    assert_eq!(
        main.rows[0].get("OperariosCosecha"),
        Some(&CellValue::Text("Ana".to_string()))
    );
}

#[test]
fn diff_prefers_record_id_over_submission_id() {
    let table = Table {
        name: "Main".to_string(),
        columns: vec!["_id".into(), "submission_id".into(), "Farm".into()],
        rows: vec![
            text_row(&[("_id", "5"), ("submission_id", "5"), ("Farm", "El Roble")]),
            text_row(&[("_id", "6"), ("submission_id", "6"), ("Farm", "La Meseta")]),
        ],
    };
    let stored = StoredTable {
        header: vec!["_id".into(), "submission_id".into(), "Farm".into()],
        rows: vec![vec!["5".into(), "5".into(), "stale farm name".into()]],
    };

    let new_rows = diff::new_rows(&table, &stored);
    // Row 5 is dropped even though its Farm cell changed: keys only.
    assert_eq!(new_rows.len(), 1);
    assert_eq!(new_rows[0][0], "6");
}

#[test]
fn diff_falls_back_to_submission_id() {
    let table = Table {
        name: "Main".to_string(),
        columns: vec!["submission_id".into(), "Farm".into()],
        rows: vec![
            text_row(&[("submission_id", "0"), ("Farm", "El Roble")]),
            text_row(&[("submission_id", "1"), ("Farm", "La Meseta")]),
        ],
    };
    let stored = StoredTable {
        header: vec!["submission_id".into(), "Farm".into()],
        rows: vec![vec!["0".into(), "El Roble".into()]],
    };

    let new_rows = diff::new_rows(&table, &stored);
    assert_eq!(new_rows.len(), 1);
    assert_eq!(new_rows[0][0], "1");
}

#[test]
fn diff_uses_composite_child_key() {
    let table = Table {
        name: "Main_F".to_string(),
        columns: vec!["parent_id".into(), "item_index".into(), "name".into()],
        rows: vec![
            text_row(&[("parent_id", "5"), ("item_index", "0"), ("name", "a")]),
            text_row(&[("parent_id", "5"), ("item_index", "1"), ("name", "b")]),
        ],
    };
    let stored = StoredTable {
        header: vec!["parent_id".into(), "item_index".into(), "name".into()],
        rows: vec![vec!["5".into(), "0".into(), "a".into()]],
    };

    let new_rows = diff::new_rows(&table, &stored);
    assert_eq!(new_rows.len(), 1);
    assert_eq!(new_rows[0][1], "1");
}

#[test]
fn parent_table_keys_by_record_id_despite_parent_id_field() {
    // A submission field literally named parent_id lands on the parent
    // table; the key must still be _id, so distinct records sharing that
    // field's value are not collapsed.
    let table = Table {
        name: "Main".to_string(),
        columns: vec![
            "_id".into(),
            "submission_id".into(),
            "parent_id".into(),
            "Farm".into(),
        ],
        rows: vec![
            text_row(&[
                ("_id", "5"),
                ("submission_id", "5"),
                ("parent_id", "lot-9"),
                ("Farm", "El Roble"),
            ]),
            text_row(&[
                ("_id", "6"),
                ("submission_id", "6"),
                ("parent_id", "lot-9"),
                ("Farm", "La Meseta"),
            ]),
        ],
    };
    let stored = StoredTable {
        header: vec![
            "_id".into(),
            "submission_id".into(),
            "parent_id".into(),
            "Farm".into(),
        ],
        rows: vec![vec![
            "5".into(),
            "5".into(),
            "lot-9".into(),
            "El Roble".into(),
        ]],
    };

    let new_rows = diff::new_rows(&table, &stored);
    assert_eq!(new_rows.len(), 1);
    assert_eq!(new_rows[0][0], "6");
}

#[test]
fn diff_treats_missing_key_columns_as_all_new() {
    let table = Table {
        name: "Main".to_string(),
        columns: vec!["submission_id".into(), "Farm".into()],
        rows: vec![text_row(&[("submission_id", "0"), ("Farm", "El Roble")])],
    };
    // Stored header predates the key column, so no key qualifies.
    let stored = StoredTable {
        header: vec!["Farm".into()],
        rows: vec![vec!["El Roble".into()]],
    };

    assert_eq!(diff::new_rows(&table, &stored).len(), 1);
}

// ===== engine tests with in-memory collaborators =====

struct StaticFeed(Vec<Record>);

impl SourceFeed for StaticFeed {
    fn fetch_all(&self) -> Result<Vec<Record>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct MemoryStore {
    tables: RefCell<BTreeMap<String, StoredTable>>,
    fail_lookup: Vec<String>,
}

impl Store for MemoryStore {
    fn read_table(&self, name: &str) -> Result<TableLookup> {
        if self.fail_lookup.iter().any(|failing| failing == name) {
            return Err(SyncError::TableLookup {
                table: name.to_string(),
                message: "store offline".to_string(),
            });
        }
        Ok(self
            .tables
            .borrow()
            .get(name)
            .cloned()
            .map(TableLookup::Found)
            .unwrap_or(TableLookup::NotFound))
    }

    fn create_table(&self, name: &str, header: &[String]) -> Result<()> {
        self.tables
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| StoredTable {
                header: header.to_vec(),
                rows: Vec::new(),
            });
        Ok(())
    }

    fn append_rows(&self, name: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut tables = self.tables.borrow_mut();
        let stored = tables.get_mut(name).ok_or_else(|| SyncError::Append {
            table: name.to_string(),
            message: "table does not exist".to_string(),
        })?;
        stored.rows.extend(rows.iter().cloned());
        Ok(())
    }
}

struct NullExport;

impl LocalExport for NullExport {
    fn write(&self, _tables: &TableSet) -> Result<()> {
        Ok(())
    }
}

fn outcome<'a>(report: &'a RunReport, table: &str) -> &'a TableOutcome {
    report
        .outcomes
        .iter()
        .find(|(name, _)| name == table)
        .map(|(_, outcome)| outcome)
        .expect("table present in report")
}

fn batch() -> Vec<Record> {
    vec![
        record(json!({"_id": 5, "Farm": "El Roble", "F": [{"name": "a"}, {"name": "b"}]})),
        record(json!({"_id": 6, "Farm": "La Meseta"})),
    ]
}

#[test]
fn first_run_creates_tables_and_second_run_is_noop() {
    let feed = StaticFeed(batch());
    let store = MemoryStore::default();

    let first = sync::run(&feed, &store, &NullExport, &default_patterns()).expect("first run");
    assert_eq!(outcome(&first, "Main"), &TableOutcome::Created(2));
    assert_eq!(outcome(&first, "Main_F"), &TableOutcome::Created(2));

    // Same batch again: every key is already present, nothing is appended.
    let second = sync::run(&feed, &store, &NullExport, &default_patterns()).expect("second run");
    assert_eq!(outcome(&second, "Main"), &TableOutcome::NoOp);
    assert_eq!(outcome(&second, "Main_F"), &TableOutcome::NoOp);

    let tables = store.tables.borrow();
    assert_eq!(tables["Main"].rows.len(), 2);
    assert_eq!(tables["Main_F"].rows.len(), 2);
}

#[test]
fn growing_batch_appends_only_new_keys() {
    let store = MemoryStore::default();
    sync::run(&StaticFeed(batch()), &store, &NullExport, &default_patterns()).expect("first run");

    let mut grown = batch();
    grown.push(record(json!({"_id": 7, "Farm": "Nueva"})));
    let report = sync::run(&StaticFeed(grown), &store, &NullExport, &default_patterns())
        .expect("second run");
    assert_eq!(outcome(&report, "Main"), &TableOutcome::Appended(1));

    // The union of persisted keys stays duplicate-free.
    let tables = store.tables.borrow();
    let main = &tables["Main"];
    let id = main
        .header
        .iter()
        .position(|column| column == "_id")
        .expect("_id column");
    let keys: HashSet<&String> = main.rows.iter().map(|row| &row[id]).collect();
    assert_eq!(keys.len(), main.rows.len());
}

#[test]
fn missing_child_table_is_created_with_header() {
    let store = MemoryStore::default();
    sync::run(
        &StaticFeed(vec![record(json!({"_id": 5, "Farm": "El Roble"}))]),
        &store,
        &NullExport,
        &default_patterns(),
    )
    .expect("seed run");

    // The next batch introduces a nested field the store has never seen.
    let report = sync::run(&StaticFeed(batch()), &store, &NullExport, &default_patterns())
        .expect("second run");
    assert_eq!(outcome(&report, "Main_F"), &TableOutcome::Created(2));

    let tables = store.tables.borrow();
    assert_eq!(&tables["Main_F"].header[..2], ["parent_id", "item_index"]);
    assert_eq!(tables["Main_F"].rows.len(), 2);
}

#[test]
fn one_failing_table_does_not_block_the_others() {
    let feed = StaticFeed(batch());
    let store = MemoryStore {
        fail_lookup: vec!["Main".to_string()],
        ..MemoryStore::default()
    };

    let report = sync::run(&feed, &store, &NullExport, &default_patterns()).expect("run");
    assert!(matches!(outcome(&report, "Main"), TableOutcome::Failed(_)));
    assert_eq!(outcome(&report, "Main_F"), &TableOutcome::Created(2));
}

#[test]
fn empty_batch_is_a_clean_noop() {
    let store = MemoryStore::default();
    let report = sync::run(
        &StaticFeed(Vec::new()),
        &store,
        &NullExport,
        &default_patterns(),
    )
    .expect("run");
    assert!(report.outcomes.is_empty());
    assert!(store.tables.borrow().is_empty());
}
