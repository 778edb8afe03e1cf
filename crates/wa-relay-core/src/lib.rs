// ── wa-relay core ──────────────────────────────────────────────────────────
// WhatsApp Business webhook relay into Google Sheets.
//
// Layers, bottom-up:
//   error, table, a1, clock            pure types and helpers
//   gateway, memory, google            Spreadsheet Gateway and its backends
//   reconciler, campaign               row read-modify-write and status markers
//   events, dispatcher                 webhook model and routing
//   whatsapp                           outbound Cloud API client
//   config                             file + env configuration
//
// Binaries (server, CLI) build a gateway with `build_gateway` and pass it
// explicitly to the Dispatcher; nothing here is a global.

pub mod a1;
pub mod campaign;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod google;
pub mod memory;
pub mod reconciler;
pub mod table;
pub mod whatsapp;

pub use config::{Backend, RelayConfig};
pub use dispatcher::{DispatchReport, DispatchTables, Dispatcher};
pub use error::{RelayError, RelayResult};
pub use gateway::SheetGateway;
pub use reconciler::{ReconcileOutcome, Reconciler, UpdateRequest};
pub use table::{Table, TableRef};
pub use whatsapp::{OutboundMessage, WhatsAppClient};

use log::{info, warn};
use std::sync::Arc;

/// Construct the configured backend.
///
/// The Google backend without credentials still starts: every call then
/// fails with `Auth`, which the dispatcher logs per event.
pub fn build_gateway(config: &RelayConfig, http: reqwest::Client) -> Arc<dyn SheetGateway> {
    match config.backend {
        Backend::Memory => {
            info!("[config] Using in-memory spreadsheet backend");
            Arc::new(memory::MemoryGateway::autocreating())
        }
        Backend::Google => {
            let sheets = &config.sheets;
            let auth: Arc<dyn google::TokenProvider> = match google::ServiceAccountKey::from_sources(
                sheets.service_account_json_base64.as_deref(),
                sheets.service_account_json.as_deref(),
            ) {
                Ok(key) => {
                    info!("[config] Google service account {}", key.client_email);
                    Arc::new(google::ServiceAccountAuth::new(key, http.clone()))
                }
                Err(e) => {
                    warn!("[config] No usable service account: {}", e);
                    Arc::new(google::MissingCredentials(e.to_string()))
                }
            };
            Arc::new(google::GoogleSheetsGateway::new(http, auth))
        }
    }
}

/// Shared HTTP client for the Sheets, OAuth and Graph calls.
pub fn http_client() -> RelayResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("wa-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RelayError::Config(format!("HTTP client: {}", e)))
}
