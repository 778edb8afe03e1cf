// wa-relay: Spreadsheet Gateway
//
// The single seam between relay logic and the remote tabular store.
// Implementations:
//   google::sheets::GoogleSheetsGateway   Sheets REST v4
//   memory::MemoryGateway                 in-process grid (tests, dry runs)
//
// Every call is independently fallible and nothing is transactional: a read
// that succeeds followed by a write that fails leaves the remote untouched.

use crate::error::RelayResult;
use crate::table::{is_blank_row, Table, TableRef};
use async_trait::async_trait;
use log::info;

#[async_trait]
pub trait SheetGateway: Send + Sync {
    /// Short backend label for logs.
    fn backend(&self) -> &'static str;

    /// Full current contents (header + data rows) in one read.
    async fn read_table(&self, table: &TableRef) -> RelayResult<Table>;

    /// First row only. Backends that can address a single row override this.
    async fn read_header(&self, table: &TableRef) -> RelayResult<Vec<String>> {
        Ok(self
            .read_table(table)
            .await?
            .into_rows()
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Append one row after the last row of the table.
    async fn append_row(&self, table: &TableRef, values: &[String]) -> RelayResult<()>;

    /// Overwrite the row at absolute zero-based `row_index` (0 is the header).
    async fn write_row(&self, table: &TableRef, row_index: usize, values: &[String]) -> RelayResult<()>;

    /// Write `headers` as row 0 when the first row is empty. Returns whether
    /// anything was written; calling it again is a no-op.
    async fn ensure_headers(&self, table: &TableRef, headers: &[String]) -> RelayResult<bool> {
        let first = self.read_header(table).await?;
        if !is_blank_row(&first) {
            return Ok(false);
        }
        self.write_row(table, 0, headers).await?;
        info!("[{}] Wrote {} headers to {}", self.backend(), headers.len(), table);
        Ok(true)
    }
}
