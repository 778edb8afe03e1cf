// wa-relay: Row Reconciler
//
// Turns a sparse field-update request into a full-row overwrite:
//   read table → locate key column → first row whose key cell matches →
//   pad the row to header width → overwrite the first cell under each
//   named column → write back at the same absolute row.
//
// `plan_update` is the pure half (no I/O); `Reconciler::reconcile` wraps it
// with one gateway read and at most one gateway write.
//
// Cost is one full-table read per update. There is no cached header index
// and no per-key locking: two updates racing on the same key can both read
// before either writes, and the later write wins for any field both touch.

use crate::error::{RelayError, RelayResult};
use crate::gateway::SheetGateway;
use crate::table::{Table, TableRef};
use log::{debug, info, warn};
use std::sync::Arc;

// ── Request / outcome types ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub table: TableRef,
    pub key_column: String,
    pub key_value: String,
    /// Applied in order; a later entry for the same column wins.
    pub updates: Vec<(String, String)>,
}

impl UpdateRequest {
    pub fn new(table: TableRef, key_column: impl Into<String>, key_value: impl Into<String>) -> Self {
        UpdateRequest {
            table,
            key_column: key_column.into(),
            key_value: key_value.into(),
            updates: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.updates.push((column.into(), value.into()));
        self
    }
}

/// What a reconciliation did. Only `Updated` involved a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Updated {
        row_index: usize,
        values: Vec<String>,
        /// Update columns that are not in the header and were dropped.
        ignored: Vec<String>,
    },
    /// No data row carries the key value.
    NotFound,
    /// The table has no header row.
    EmptyTable,
}

impl ReconcileOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, ReconcileOutcome::Updated { .. })
    }
}

// ── Pure merge ─────────────────────────────────────────────────────────

/// Compute the row to write for `request` against `table` without touching
/// the remote store.
pub fn plan_update(table: &Table, request: &UpdateRequest) -> RelayResult<ReconcileOutcome> {
    let Some(header) = table.header() else {
        return Ok(ReconcileOutcome::EmptyTable);
    };

    let key_index = table
        .column_index(&request.key_column)
        .ok_or_else(|| RelayError::schema(request.table.to_string(), request.key_column.as_str()))?;

    let Some(row_index) = table.find_row(key_index, &request.key_value) else {
        return Ok(ReconcileOutcome::NotFound);
    };

    let mut values = table.rows()[row_index].clone();
    values.resize(header.len(), String::new());
    let mut ignored = Vec::new();

    for (column, value) in &request.updates {
        if column == &request.key_column {
            warn!(
                "[reconcile] Refusing to rewrite key column '{}' of {} (key {})",
                column, request.table, request.key_value
            );
            continue;
        }
        // Blank header cells never name a column.
        let target = if column.is_empty() { None } else { table.column_index(column) };
        match target {
            Some(i) => values[i] = value.clone(),
            None => ignored.push(column.clone()),
        }
    }

    Ok(ReconcileOutcome::Updated {
        row_index,
        values,
        ignored,
    })
}

// ── Reconciler ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Reconciler {
    gateway: Arc<dyn SheetGateway>,
}

impl Reconciler {
    pub fn new(gateway: Arc<dyn SheetGateway>) -> Self {
        Reconciler { gateway }
    }

    /// Read-modify-write one row. Not-found and empty-table outcomes make
    /// no write; gateway and schema failures propagate.
    pub async fn reconcile(&self, request: &UpdateRequest) -> RelayResult<ReconcileOutcome> {
        let table = self.gateway.read_table(&request.table).await?;
        let outcome = plan_update(&table, request)?;

        match &outcome {
            ReconcileOutcome::Updated { row_index, values, ignored } => {
                if !ignored.is_empty() {
                    debug!(
                        "[reconcile] Dropped columns not in {} header: {}",
                        request.table,
                        ignored.join(", ")
                    );
                }
                self.gateway.write_row(&request.table, *row_index, values).await?;
                info!(
                    "[reconcile] {} row {} updated for {}={}",
                    request.table, row_index, request.key_column, request.key_value
                );
            }
            ReconcileOutcome::NotFound => {
                info!(
                    "[reconcile] No row in {} with {}={}",
                    request.table, request.key_column, request.key_value
                );
            }
            ReconcileOutcome::EmptyTable => {
                warn!("[reconcile] {} has no header row, skipping update", request.table);
            }
        }

        Ok(outcome)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
