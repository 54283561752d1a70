//! Destination store adapter over the Google Sheets v4 REST surface.
//!
//! The adapter is deliberately thin: it reads a worksheet's current values,
//! creates missing worksheets, and appends rows. Token acquisition happens
//! outside; the store is handed a ready bearer token.

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::model::StoredTable;
use crate::sync::{Store, TableLookup};

pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    token: String,
}

impl SheetsStore {
    pub fn new(base_url: String, spreadsheet_id: String, token: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            spreadsheet_id,
            token,
        }
    }

    fn values_url(&self, name: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{}",
            self.base_url, self.spreadsheet_id, name, suffix
        )
    }

    fn batch_update_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.base_url, self.spreadsheet_id
        )
    }
}

/// Response body of a `values` GET: the header row followed by data rows.
/// Cells may arrive as non-string JSON values depending on render options.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// How the store answered an `addSheet` request.
#[derive(Debug, Clone, PartialEq)]
pub enum AddSheetOutcome {
    /// A fresh worksheet was created and still needs its header row.
    Created,
    /// The worksheet already exists from an earlier attempt, header included.
    AlreadyExists,
}

/// Classifies an `addSheet` response. The API rejects a duplicate title with
/// a 400 whose body names the clash; that counts as success for a retried
/// create, while any other non-success status is a failure.
pub fn add_sheet_outcome(
    status: StatusCode,
    detail: &str,
) -> std::result::Result<AddSheetOutcome, String> {
    if status.is_success() {
        return Ok(AddSheetOutcome::Created);
    }
    if detail.contains("already exists") {
        return Ok(AddSheetOutcome::AlreadyExists);
    }
    Err(format!("store returned status {status}"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Store for SheetsStore {
    /// Reads a worksheet's full contents. A 400 on the values range is how
    /// the API signals an unknown worksheet title, and maps to `NotFound`;
    /// any other non-success status aborts this table's sync.
    fn read_table(&self, name: &str) -> Result<TableLookup> {
        let response = self
            .client
            .get(self.values_url(name, ""))
            .bearer_auth(&self.token)
            .send()
            .map_err(|error| SyncError::TableLookup {
                table: name.to_string(),
                message: error.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => {
                let range: ValueRange =
                    response.json().map_err(|error| SyncError::TableLookup {
                        table: name.to_string(),
                        message: error.to_string(),
                    })?;
                let mut rows = range.values.into_iter();
                let header: Vec<String> = rows
                    .next()
                    .unwrap_or_default()
                    .iter()
                    .map(cell_text)
                    .collect();
                let rows: Vec<Vec<String>> =
                    rows.map(|row| row.iter().map(cell_text).collect()).collect();
                debug!(table = name, rows = rows.len(), "read stored table");
                Ok(TableLookup::Found(StoredTable { header, rows }))
            }
            StatusCode::BAD_REQUEST => Ok(TableLookup::NotFound),
            status => Err(SyncError::TableLookup {
                table: name.to_string(),
                message: format!("store returned status {status}"),
            }),
        }
    }

    /// Adds a worksheet and writes its header row. A "title already exists"
    /// rejection means a retried create: the earlier attempt already wrote
    /// the header, so nothing more is appended and the call stays idempotent.
    fn create_table(&self, name: &str, header: &[String]) -> Result<()> {
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": name } } }]
        });
        let response = self
            .client
            .post(self.batch_update_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|error| SyncError::TableCreate {
                table: name.to_string(),
                message: error.to_string(),
            })?;

        let status = response.status();
        let detail = if status.is_success() {
            String::new()
        } else {
            response.text().unwrap_or_default()
        };

        match add_sheet_outcome(status, &detail) {
            Ok(AddSheetOutcome::Created) => self
                .append(name, &[header.to_vec()])
                .map_err(|message| SyncError::TableCreate {
                    table: name.to_string(),
                    message,
                }),
            Ok(AddSheetOutcome::AlreadyExists) => Ok(()),
            Err(message) => Err(SyncError::TableCreate {
                table: name.to_string(),
                message,
            }),
        }
    }

    fn append_rows(&self, name: &str, rows: &[Vec<String>]) -> Result<()> {
        self.append(name, rows).map_err(|message| SyncError::Append {
            table: name.to_string(),
            message,
        })
    }
}

impl SheetsStore {
    fn append(&self, name: &str, rows: &[Vec<String>]) -> std::result::Result<(), String> {
        let body = json!({ "values": rows });
        let response = self
            .client
            .post(self.values_url(name, ":append?valueInputOption=RAW"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|error| error.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("store returned status {status}"));
        }
        Ok(())
    }
}
