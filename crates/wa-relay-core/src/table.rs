// wa-relay: Table Model
// TableRef (spreadsheet + sheet) and Table (header + data rows).

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Table address ──────────────────────────────────────────────────────

/// Identifies one sheet inside one spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub spreadsheet_id: String,
    pub sheet: String,
}

impl TableRef {
    pub fn new(spreadsheet_id: impl Into<String>, sheet: impl Into<String>) -> Self {
        TableRef { spreadsheet_id: spreadsheet_id.into(), sheet: sheet.into() }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.spreadsheet_id, self.sheet)
    }
}

// ── Table ──────────────────────────────────────────────────────────────

/// Full contents of a sheet as returned by one read. Row 0 is the header.
/// Rows may be ragged: the remote store trims trailing empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Table { rows }
    }

    /// Build from a Sheets `values` grid. Non-string cells (numbers,
    /// booleans) are stringified; nulls become empty strings.
    pub fn from_json_grid(values: &serde_json::Value) -> Self {
        let rows = values
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(cell_to_string).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Table { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// Number of rows including the header.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The header row, or `None` when the table has no rows or its first
    /// row holds no non-empty cell.
    pub fn header(&self) -> Option<&[String]> {
        self.rows
            .first()
            .filter(|row| !is_blank_row(row))
            .map(|row| row.as_slice())
    }

    /// Index of the first header cell equal to `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header()?.iter().position(|h| h == name)
    }

    /// Absolute index of the first data row whose cell at `column` equals
    /// `value` exactly. The header row is never matched.
    pub fn find_row(&self, column: usize, value: &str) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| row.get(column).map(String::as_str) == Some(value))
            .map(|(idx, _)| idx)
    }
}

pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.is_empty())
}

fn cell_to_string(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn campaign() -> Table {
        Table::new(vec![
            strings(&["ID Mensaje", "Estado Entrega", "Hora Entrega"]),
            strings(&["abc123", "", ""]),
            strings(&["def456", "Entregado"]),
            strings(&["abc123", "dup", ""]),
        ])
    }

    #[test]
    fn test_header_and_column_index() {
        let t = campaign();
        assert_eq!(t.header().unwrap().len(), 3);
        assert_eq!(t.column_index("Hora Entrega"), Some(2));
        assert_eq!(t.column_index("hora entrega"), None);
    }

    #[test]
    fn test_blank_first_row_is_no_header() {
        assert!(Table::default().header().is_none());
        let t = Table::new(vec![strings(&["", ""]), strings(&["x"])]);
        assert!(t.header().is_none());
        assert_eq!(t.column_index("x"), None);
    }

    #[test]
    fn test_find_row_first_match_wins() {
        let t = campaign();
        assert_eq!(t.find_row(0, "abc123"), Some(1));
        assert_eq!(t.find_row(0, "def456"), Some(2));
        assert_eq!(t.find_row(0, "zzz999"), None);
    }

    #[test]
    fn test_find_row_never_matches_header() {
        let t = campaign();
        assert_eq!(t.find_row(0, "ID Mensaje"), None);
    }

    #[test]
    fn test_find_row_exact_match_only() {
        let t = campaign();
        assert_eq!(t.find_row(0, "ABC123"), None);
        assert_eq!(t.find_row(0, " abc123"), None);
    }

    #[test]
    fn test_from_json_grid_stringifies_cells() {
        let t = Table::from_json_grid(&json!([["id", "n", "ok"], ["x", 42, true], ["y", null]]));
        assert_eq!(t.rows()[1], strings(&["x", "42", "true"]));
        assert_eq!(t.rows()[2], strings(&["y", ""]));
    }

    #[test]
    fn test_from_json_grid_missing_values() {
        assert!(Table::from_json_grid(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_table_ref_display() {
        assert_eq!(TableRef::new("abc", "Hoja1").to_string(), "abc/Hoja1");
    }
}
