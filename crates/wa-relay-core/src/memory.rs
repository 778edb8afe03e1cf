// wa-relay: In-Memory Gateway
// A SheetGateway over a process-local grid map. Used by the test suites, the
// CLI's --dry-run mode and the server's `memory` backend.

use crate::error::{RelayError, RelayResult};
use crate::gateway::SheetGateway;
use crate::table::{Table, TableRef};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct MemoryGateway {
    sheets: Mutex<HashMap<TableRef, Vec<Vec<String>>>>,
    appends: AtomicU64,
    writes: AtomicU64,
    failing: AtomicBool,
    /// Create unknown sheets on first write/append instead of failing.
    autocreate: bool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that creates sheets on first append/write, so a fresh
    /// dry run behaves like a spreadsheet with empty tabs.
    pub fn autocreating() -> Self {
        MemoryGateway { autocreate: true, ..Self::default() }
    }

    /// Seed (or replace) a sheet.
    pub fn with_table(self, table: TableRef, rows: Vec<Vec<String>>) -> Self {
        self.insert_table(table, rows);
        self
    }

    pub fn insert_table(&self, table: TableRef, rows: Vec<Vec<String>>) {
        self.sheets.lock().insert(table, rows);
    }

    /// Current grid of a sheet, if it exists.
    pub fn snapshot(&self, table: &TableRef) -> Option<Vec<Vec<String>>> {
        self.sheets.lock().get(table).cloned()
    }

    pub fn append_count(&self) -> u64 {
        self.appends.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// While set, every call fails with `Transient`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check_available(&self) -> RelayResult<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(RelayError::Transient("memory gateway unavailable".into()));
        }
        Ok(())
    }

    fn with_sheet<T>(
        &self,
        table: &TableRef,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> T,
    ) -> RelayResult<T> {
        let mut sheets = self.sheets.lock();
        if self.autocreate {
            return Ok(f(sheets.entry(table.clone()).or_default()));
        }
        sheets
            .get_mut(table)
            .map(f)
            .ok_or_else(|| RelayError::TableNotFound(table.to_string()))
    }
}

#[async_trait]
impl SheetGateway for MemoryGateway {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn read_table(&self, table: &TableRef) -> RelayResult<Table> {
        self.check_available()?;
        self.with_sheet(table, |rows| Table::new(rows.clone()))
    }

    async fn append_row(&self, table: &TableRef, values: &[String]) -> RelayResult<()> {
        self.check_available()?;
        self.with_sheet(table, |rows| rows.push(values.to_vec()))?;
        self.appends.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write_row(&self, table: &TableRef, row_index: usize, values: &[String]) -> RelayResult<()> {
        self.check_available()?;
        self.with_sheet(table, |rows| {
            if rows.len() <= row_index {
                rows.resize(row_index + 1, Vec::new());
            }
            // Like a ranged update: cells beyond `values` stay as they were.
            let row = &mut rows[row_index];
            if row.len() < values.len() {
                row.resize(values.len(), String::new());
            }
            row[..values.len()].clone_from_slice(values);
        })?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
