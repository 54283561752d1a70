//! Run configuration.
//!
//! All formerly global constants (feed URL, spreadsheet id, credential path)
//! live in an explicit [`Config`] value loaded from a JSON file and passed
//! into the engine, so nothing is process-wide state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::expand;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Submissions endpoint of the data-collection API. Pagination is
    /// followed from here via the `next` pointer.
    pub source_url: String,

    /// Optional API token sent as `Authorization: Token …` to the feed.
    #[serde(default)]
    pub source_token: Option<String>,

    /// Identifier of the destination spreadsheet.
    pub spreadsheet_id: String,

    /// File holding the bearer token used against the spreadsheet API.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// Path of the local xlsx export written on every run.
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Substring patterns marking multi-value columns for row expansion.
    #[serde(default = "expand::default_patterns")]
    pub multi_value_fields: Vec<String>,

    /// Base URL of the spreadsheet API; overridable for mirrors and tests.
    #[serde(default = "default_sheets_base_url")]
    pub sheets_base_url: String,
}

fn default_token_file() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("output/report.xlsx")
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(SyncError::MissingInput(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(SyncError::Config("source_url must not be empty".into()));
        }
        if self.spreadsheet_id.trim().is_empty() {
            return Err(SyncError::Config("spreadsheet_id must not be empty".into()));
        }
        Ok(())
    }
}
