//! Paginated submissions feed over the KoboToolbox-style REST API.
//!
//! Pages are either a bare JSON array of submissions or an object of the
//! shape `{"results": [...], "next": "<url>"}`; the walk follows `next`
//! until it is null or absent. Anything else is a malformed page and aborts
//! the run.

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::model::Record;
use crate::sync::SourceFeed;

pub struct KoboFeed {
    url: String,
    token: Option<String>,
}

impl KoboFeed {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self { url, token }
    }
}

impl SourceFeed for KoboFeed {
    /// Walks pagination until exhausted. The HTTP client lives only for the
    /// duration of the fetch, so the session is released once pagination
    /// ends regardless of outcome.
    fn fetch_all(&self) -> Result<Vec<Record>> {
        let client = Client::new();
        let mut records = Vec::new();
        let mut next_url = Some(self.url.clone());

        while let Some(url) = next_url {
            debug!(%url, "fetching submissions page");
            let mut request = client.get(&url);
            if let Some(token) = &self.token {
                request = request.header("Authorization", format!("Token {token}"));
            }
            let page: Value = request.send()?.error_for_status()?.json()?;

            next_url = match page {
                Value::Array(items) => {
                    collect_records(&mut records, items)?;
                    None
                }
                Value::Object(mut fields) => {
                    match fields.remove("results") {
                        Some(Value::Array(items)) => collect_records(&mut records, items)?,
                        Some(_) => {
                            return Err(SyncError::Fetch(
                                "page field 'results' is not an array".into(),
                            ));
                        }
                        None => {}
                    }
                    match fields.remove("next") {
                        Some(Value::String(next)) => Some(next),
                        _ => None,
                    }
                }
                _ => {
                    return Err(SyncError::Fetch(
                        "page is neither an object nor an array".into(),
                    ));
                }
            };
        }

        Ok(records)
    }
}

fn collect_records(records: &mut Vec<Record>, items: Vec<Value>) -> Result<()> {
    for item in items {
        match item {
            Value::Object(fields) => records.push(fields),
            _ => return Err(SyncError::Fetch("submission is not an object".into())),
        }
    }
    Ok(())
}
