// wa-relay: Google Sheets Gateway
//
// SheetGateway over the Sheets REST v4 `values` endpoints:
//   read_table   GET  values/{Sheet}?valueRenderOption=FORMULA
//   read_header  GET  values/{Sheet!1:1}
//   append_row   POST values/{Sheet!A1}:append  (USER_ENTERED, INSERT_ROWS)
//   write_row    PUT  values/{Sheet!A{n}:{col}{n}} (USER_ENTERED)
//
// Status mapping: 401/403 → Auth, 404 or unparseable range → TableNotFound,
// 429/5xx → Transient, other 4xx → Upstream. No retries.
//
// Tables are read as entered (formulas, unformatted numbers) because
// reconciled rows are written back whole with USER_ENTERED: a displayed
// value written back would replace the formula behind it.

use super::auth::TokenProvider;
use crate::a1;
use crate::error::{RelayError, RelayResult};
use crate::gateway::SheetGateway;
use crate::table::{Table, TableRef};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const READ_AS_ENTERED: &str = "?valueRenderOption=FORMULA";
const USER_ENTERED: &str = "?valueInputOption=USER_ENTERED";
const APPEND_AS_NEW_ROWS: &str = ":append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS";

pub struct GoogleSheetsGateway {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn TokenProvider>,
}

impl GoogleSheetsGateway {
    pub fn new(http: reqwest::Client, auth: Arc<dyn TokenProvider>) -> Self {
        GoogleSheetsGateway { http, base_url: SHEETS_API_BASE.into(), auth }
    }

    /// Point at a different API root (emulators, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, table: &TableRef, range: &str, suffix: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.base_url,
            urlencoding::encode(&table.spreadsheet_id),
            urlencoding::encode(range),
            suffix
        )
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        table: &TableRef,
        body: Option<&Value>,
    ) -> RelayResult<Value> {
        let token = self.auth.access_token().await?;

        let mut req = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let json: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

        if status >= 400 {
            return Err(classify_status(status, json, table));
        }
        debug!("[sheets] {} {} → {}", method, table, status);
        Ok(json)
    }
}

/// Map a failed Sheets response onto the relay taxonomy.
pub fn classify_status(status: u16, body: Value, table: &TableRef) -> RelayError {
    let message = body["error"]["message"].as_str().unwrap_or_default().to_string();
    match status {
        401 | 403 => RelayError::Auth(format!("Sheets rejected credentials for {} ({}): {}", table, status, message)),
        404 => RelayError::TableNotFound(table.to_string()),
        400 if message.contains("Unable to parse range") => RelayError::TableNotFound(table.to_string()),
        429 => RelayError::Transient(format!("Sheets rate limit on {}: {}", table, message)),
        s if s >= 500 => RelayError::Transient(format!("Sheets unavailable ({}) on {}: {}", s, table, message)),
        s => RelayError::upstream("sheets", s, body),
    }
}

#[async_trait]
impl SheetGateway for GoogleSheetsGateway {
    fn backend(&self) -> &'static str {
        "sheets"
    }

    async fn read_table(&self, table: &TableRef) -> RelayResult<Table> {
        let url = self.values_url(table, &a1::sheet_range(&table.sheet), READ_AS_ENTERED);
        let resp = self.request(Method::GET, &url, table, None).await?;
        Ok(Table::from_json_grid(&resp["values"]))
    }

    async fn read_header(&self, table: &TableRef) -> RelayResult<Vec<String>> {
        let url = self.values_url(table, &a1::header_range(&table.sheet), "");
        let resp = self.request(Method::GET, &url, table, None).await?;
        Ok(Table::from_json_grid(&resp["values"]).into_rows().into_iter().next().unwrap_or_default())
    }

    async fn append_row(&self, table: &TableRef, values: &[String]) -> RelayResult<()> {
        let url = self.values_url(table, &a1::append_anchor(&table.sheet), APPEND_AS_NEW_ROWS);
        let body = json!({ "values": [values] });
        let resp = self.request(Method::POST, &url, table, Some(&body)).await?;
        debug!(
            "[sheets] Appended to {}",
            resp["updates"]["updatedRange"].as_str().unwrap_or("?")
        );
        Ok(())
    }

    async fn write_row(&self, table: &TableRef, row_index: usize, values: &[String]) -> RelayResult<()> {
        let range = a1::row_range(&table.sheet, row_index, values.len());
        let url = self.values_url(table, &range, USER_ENTERED);
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": [values] });
        self.request(Method::PUT, &url, table, Some(&body)).await?;
        info!("[sheets] Wrote {} cells to {}", values.len(), range);
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::auth::StaticToken;

    fn gateway() -> GoogleSheetsGateway {
        GoogleSheetsGateway::new(reqwest::Client::new(), Arc::new(StaticToken("t".into())))
    }

    fn table() -> TableRef {
        TableRef::new("sheet-123", "Hoja1")
    }

    #[test]
    fn test_values_url_encodes_range() {
        let gw = gateway();
        let t = TableRef::new("abc", "Envíos Masivos");
        let url = gw.values_url(&t, &a1::row_range(&t.sheet, 1, 3), USER_ENTERED);
        assert!(url.starts_with("https://sheets.googleapis.com/v4/spreadsheets/abc/values/"));
        assert!(url.contains("%27Env%C3%ADos%20Masivos%27%21A2%3AC2"));
        assert!(url.ends_with("?valueInputOption=USER_ENTERED"));
    }

    #[test]
    fn test_table_reads_request_entered_values() {
        let gw = gateway();
        let url = gw.values_url(&table(), &a1::sheet_range("Hoja1"), READ_AS_ENTERED);
        assert_eq!(
            url,
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/Hoja1?valueRenderOption=FORMULA"
        );
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let gw = gateway().with_base_url("http://localhost:9000/v4/");
        assert!(gw.values_url(&table(), "Hoja1", "").starts_with("http://localhost:9000/v4/spreadsheets/"));
    }

    #[test]
    fn test_classify_auth() {
        let err = classify_status(403, json!({ "error": { "message": "The caller does not have permission" } }), &table());
        assert!(matches!(err, RelayError::Auth(ref m) if m.contains("permission")));
        assert!(matches!(classify_status(401, json!({}), &table()), RelayError::Auth(_)));
    }

    #[test]
    fn test_classify_missing_sheet() {
        let err = classify_status(400, json!({ "error": { "message": "Unable to parse range: Hoja9" } }), &table());
        assert!(matches!(err, RelayError::TableNotFound(_)));
        assert!(matches!(classify_status(404, json!({}), &table()), RelayError::TableNotFound(_)));
    }

    #[test]
    fn test_classify_transient() {
        assert!(classify_status(429, json!({}), &table()).is_transient());
        assert!(classify_status(503, json!({}), &table()).is_transient());
    }

    #[test]
    fn test_classify_other_client_errors_are_upstream() {
        let err = classify_status(400, json!({ "error": { "message": "Invalid values[0][1]" } }), &table());
        assert!(matches!(err, RelayError::Upstream { status: 400, .. }));
    }
}
