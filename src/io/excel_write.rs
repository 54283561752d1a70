//! Local xlsx export: one sheet per table, header row first, every cell
//! string-rendered. The export always reflects the full current run and is
//! independent of the incremental store sync.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use rust_xlsxwriter::Workbook;

use crate::error::Result;
use crate::model::TableSet;
use crate::names::{LOCAL_NAME_MAX, sanitize_name};
use crate::sync::LocalExport;

pub struct XlsxExport {
    path: PathBuf,
}

impl XlsxExport {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LocalExport for XlsxExport {
    fn write(&self, tables: &TableSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut workbook = Workbook::new();
        let mut names = SheetNameRegistry::default();

        for table in &tables.tables {
            let sheet_name = names.assign(&table.name);
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet_name)?;

            for (col_idx, header) in table.columns.iter().enumerate() {
                worksheet.write_string(0, col_idx as u16, header)?;
            }
            for (row_idx, row) in table.rows.iter().enumerate() {
                for (col_idx, cell) in table.string_row(row).iter().enumerate() {
                    worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
                }
            }
        }

        workbook.save(&self.path)?;
        Ok(())
    }
}

/// Keeps sanitized sheet names unique: truncation to the 31-character limit
/// can make distinct table names collide, in which case a numeric suffix is
/// appended.
#[derive(Debug, Default)]
struct SheetNameRegistry {
    used: HashSet<String>,
}

impl SheetNameRegistry {
    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_name(raw, LOCAL_NAME_MAX);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            // Truncation counts characters, not bytes: sanitized names may
            // hold multi-byte characters and a byte index could split one.
            let max_len = LOCAL_NAME_MAX - suffix.chars().count();
            let candidate: String = base.chars().take(max_len).chain(suffix.chars()).collect();
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}
