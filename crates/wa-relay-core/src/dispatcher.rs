// wa-relay: Event Dispatcher
//
// Routes a webhook delivery to gateway and reconciler calls:
//   message → append to the message log
//   status  → append to the status log, then mark the campaign row
//
// Campaign-only mode (the bulk-send route) skips both log appends and
// ignores messages. Every event is handled independently: a failure is
// logged, counted in the report and the next event proceeds.

use crate::campaign::CampaignColumns;
use crate::clock;
use crate::config::SheetsConfig;
use crate::error::{RelayError, RelayResult};
use crate::events::{self, MessageRecord, RelayEvent, StatusRecord, WebhookPayload};
use crate::gateway::SheetGateway;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::table::TableRef;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;

const LOG_PREVIEW_CHARS: usize = 80;

// ── Tables ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTables {
    pub messages: TableRef,
    pub statuses: TableRef,
    pub campaign: TableRef,
    pub columns: CampaignColumns,
}

impl DispatchTables {
    pub fn from_config(sheets: &SheetsConfig) -> RelayResult<Self> {
        Ok(DispatchTables {
            messages: sheets.messages_table()?,
            statuses: sheets.statuses_table()?,
            campaign: sheets.campaign_table()?,
            columns: sheets.campaign.clone(),
        })
    }
}

// ── Report ─────────────────────────────────────────────────────────────

/// What one delivery produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub messages_logged: usize,
    pub statuses_logged: usize,
    pub rows_reconciled: usize,
    pub rows_not_found: usize,
    pub empty_tables: usize,
    pub failures: usize,
    /// Events that needed no work in this mode.
    pub skipped: usize,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "messages={} statuses={} reconciled={} not_found={} empty={} failures={} skipped={}",
            self.messages_logged,
            self.statuses_logged,
            self.rows_reconciled,
            self.rows_not_found,
            self.empty_tables,
            self.failures,
            self.skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    CampaignOnly,
}

// ── Dispatcher ─────────────────────────────────────────────────────────

pub struct Dispatcher {
    gateway: Arc<dyn SheetGateway>,
    reconciler: Reconciler,
    /// `Err` holds why the sheets could not be resolved.
    tables: Result<DispatchTables, String>,
    tz: Tz,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn SheetGateway>, tables: DispatchTables, tz: Tz) -> Self {
        Dispatcher {
            reconciler: Reconciler::new(gateway.clone()),
            gateway,
            tables: Ok(tables),
            tz,
        }
    }

    /// Resolve the sheets from `sheets`. An unresolvable address does not
    /// fail construction: every event of every delivery fails with a
    /// `Config` error instead.
    pub fn from_config(gateway: Arc<dyn SheetGateway>, sheets: &SheetsConfig, tz: Tz) -> Self {
        let tables = DispatchTables::from_config(sheets).map_err(|e| {
            warn!("[dispatch] {}, deliveries will not be recorded", e);
            match e {
                RelayError::Config(reason) => reason,
                other => other.to_string(),
            }
        });
        Dispatcher {
            reconciler: Reconciler::new(gateway.clone()),
            gateway,
            tables,
            tz,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn SheetGateway> {
        &self.gateway
    }

    pub fn tables(&self) -> RelayResult<&DispatchTables> {
        self.tables
            .as_ref()
            .map_err(|reason| RelayError::Config(reason.clone()))
    }

    /// Write the log headers into empty log sheets. Failures are warnings.
    pub async fn prepare_tables(&self) {
        let tables = match self.tables() {
            Ok(t) => t,
            Err(e) => {
                warn!("[dispatch] Not preparing log sheets: {}", e);
                return;
            }
        };
        let logs = [
            (&tables.messages, events::headers(&events::MESSAGE_LOG_HEADERS)),
            (&tables.statuses, events::headers(&events::STATUS_LOG_HEADERS)),
        ];
        for (table, headers) in logs {
            match self.gateway.ensure_headers(table, &headers).await {
                Ok(true) => info!("[dispatch] Initialised headers of {}", table),
                Ok(false) => debug!("[dispatch] Headers of {} already present", table),
                Err(e) => warn!("[dispatch] Could not prepare {}: {}", table, e),
            }
        }
    }

    pub async fn dispatch(&self, payload: &WebhookPayload) -> DispatchReport {
        self.run(payload, Mode::Full, Utc::now()).await
    }

    /// Campaign markers only: no log appends, messages ignored.
    pub async fn dispatch_campaign(&self, payload: &WebhookPayload) -> DispatchReport {
        self.run(payload, Mode::CampaignOnly, Utc::now()).await
    }

    /// `dispatch` with an explicit processing time.
    pub async fn dispatch_at(&self, payload: &WebhookPayload, now: DateTime<Utc>) -> DispatchReport {
        self.run(payload, Mode::Full, now).await
    }

    pub async fn dispatch_campaign_at(&self, payload: &WebhookPayload, now: DateTime<Utc>) -> DispatchReport {
        self.run(payload, Mode::CampaignOnly, now).await
    }

    async fn run(&self, payload: &WebhookPayload, mode: Mode, now: DateTime<Utc>) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !payload.is_business_account() {
            debug!("[dispatch] Ignoring delivery for object '{}'", payload.object);
            return report;
        }

        let classified = events::classify(payload);
        let tables = match self.tables() {
            Ok(t) => t,
            Err(e) => {
                error!("[dispatch] Dropping {} event(s): {}", classified.len(), e);
                report.failures += classified.len();
                return report;
            }
        };

        let received_at = clock::format_local(now, self.tz);
        for event in classified {
            match event {
                Ok(RelayEvent::MessageReceived(m)) if mode == Mode::Full => {
                    self.log_message(tables, &m, &received_at, &mut report).await;
                }
                Ok(RelayEvent::MessageReceived(m)) => {
                    debug!("[dispatch] Skipping message {} on campaign route", m.message_id);
                    report.skipped += 1;
                }
                Ok(RelayEvent::StatusChanged(s)) => {
                    if mode == Mode::Full {
                        self.log_status(tables, &s, &received_at, &mut report).await;
                    }
                    self.mark_campaign(tables, &s, now, &mut report).await;
                }
                Err(e) => {
                    warn!("[dispatch] Undecodable event: {}", e);
                    report.failures += 1;
                }
            }
        }

        if report.is_clean() {
            info!("[dispatch] Done: {}", report);
        } else {
            warn!("[dispatch] Done with failures: {}", report);
        }
        report
    }

    async fn log_message(
        &self,
        tables: &DispatchTables,
        m: &MessageRecord,
        received_at: &str,
        report: &mut DispatchReport,
    ) {
        info!(
            "[dispatch] Message from {} ({}): {}",
            m.from,
            m.kind,
            preview(&m.text)
        );
        match self.gateway.append_row(&tables.messages, &m.log_row(received_at)).await {
            Ok(()) => report.messages_logged += 1,
            Err(e) => {
                error!("[dispatch] Failed to log message {}: {}", m.message_id, e);
                report.failures += 1;
            }
        }
    }

    async fn log_status(
        &self,
        tables: &DispatchTables,
        s: &StatusRecord,
        received_at: &str,
        report: &mut DispatchReport,
    ) {
        info!("[dispatch] Status {} for {} ({})", s.status, s.message_id, s.recipient_id);
        match self.gateway.append_row(&tables.statuses, &s.log_row(received_at)).await {
            Ok(()) => report.statuses_logged += 1,
            Err(e) => {
                error!("[dispatch] Failed to log status {}: {}", s.message_id, e);
                report.failures += 1;
            }
        }
    }

    async fn mark_campaign(
        &self,
        tables: &DispatchTables,
        s: &StatusRecord,
        now: DateTime<Utc>,
        report: &mut DispatchReport,
    ) {
        let at = clock::format_local(clock::event_time_or(s.timestamp.as_deref(), now), self.tz);
        let Some(request) = tables
            .columns
            .request_for(&tables.campaign, &s.message_id, &s.status, &at)
        else {
            report.skipped += 1;
            return;
        };

        match self.reconciler.reconcile(&request).await {
            Ok(ReconcileOutcome::Updated { .. }) => report.rows_reconciled += 1,
            Ok(ReconcileOutcome::NotFound) => report.rows_not_found += 1,
            Ok(ReconcileOutcome::EmptyTable) => report.empty_tables += 1,
            Err(e) => {
                if e.is_transient() {
                    warn!("[dispatch] Campaign update for {} dropped: {}", s.message_id, e);
                } else {
                    error!("[dispatch] Campaign update for {} failed: {}", s.message_id, e);
                }
                report.failures += 1;
            }
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    format!("{}…", cut)
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGateway;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn tables() -> DispatchTables {
        DispatchTables {
            messages: TableRef::new("main", "Respuestas"),
            statuses: TableRef::new("main", "Estados"),
            campaign: TableRef::new("bulk", "Hoja1"),
            columns: CampaignColumns::default(),
        }
    }

    fn gateway() -> Arc<MemoryGateway> {
        let t = tables();
        Arc::new(
            MemoryGateway::new()
                .with_table(t.messages.clone(), vec![events::headers(&events::MESSAGE_LOG_HEADERS)])
                .with_table(t.statuses.clone(), vec![events::headers(&events::STATUS_LOG_HEADERS)])
                .with_table(
                    t.campaign.clone(),
                    vec![
                        strings(&["Nombre", "ID Mensaje", "Estado Entrega", "Hora Entrega", "Estado Lectura", "Hora Lectura"]),
                        strings(&["Ana", "wamid.abc", "", "", "", ""]),
                    ],
                ),
        )
    }

    fn dispatcher(gw: Arc<MemoryGateway>) -> Dispatcher {
        Dispatcher::new(gw, tables(), chrono_tz::America::Bogota)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()
    }

    fn payload(value: Value) -> WebhookPayload {
        serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{ "id": "WABA", "changes": [{ "field": "messages", "value": value }] }]
        }))
        .unwrap()
    }

    fn status(id: &str, status: &str, ts: Option<&str>) -> Value {
        let mut s = json!({ "id": id, "status": status, "recipient_id": "573001112233" });
        if let Some(ts) = ts {
            s["timestamp"] = json!(ts);
        }
        json!({ "statuses": [s] })
    }

    #[tokio::test]
    async fn test_text_message_appends_one_row() {
        let gw = gateway();
        let d = dispatcher(gw.clone());
        let p = payload(json!({
            "contacts": [{ "wa_id": "573001112233", "profile": { "name": "Ana" } }],
            "messages": [{ "from": "573001112233", "id": "wamid.in", "type": "text", "text": { "body": "Hola" } }]
        }));

        let report = d.dispatch_at(&p, now()).await;
        assert_eq!(report.messages_logged, 1);
        assert_eq!(gw.append_count(), 1);
        assert_eq!(gw.write_count(), 0);

        let rows = gw.snapshot(&tables().messages).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "01/03/2024, 10:00:00");
        assert_eq!(rows[1][2], "Ana");
        assert_eq!(rows[1][4], "Hola");
    }

    #[tokio::test]
    async fn test_read_status_logs_and_marks_campaign() {
        let gw = gateway();
        let d = dispatcher(gw.clone());
        // 1709305200 = 2024-03-01T15:00:00Z = 10:00:00 Bogotá
        let p = payload(status("wamid.abc", "read", Some("1709305200")));

        let report = d.dispatch_at(&p, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()).await;
        assert_eq!(report.statuses_logged, 1);
        assert_eq!(report.rows_reconciled, 1);
        assert!(report.is_clean());

        assert_eq!(gw.snapshot(&tables().statuses).unwrap().len(), 2);
        let campaign = gw.snapshot(&tables().campaign).unwrap();
        assert_eq!(
            campaign[1],
            strings(&["Ana", "wamid.abc", "", "", "Leído", "01/03/2024, 10:00:00"])
        );
    }

    #[tokio::test]
    async fn test_delivered_without_timestamp_uses_processing_time() {
        let gw = gateway();
        let d = dispatcher(gw.clone());
        d.dispatch_at(&payload(status("wamid.abc", "delivered", None)), now()).await;
        let campaign = gw.snapshot(&tables().campaign).unwrap();
        assert_eq!(campaign[1][2], "Entregado");
        assert_eq!(campaign[1][3], "01/03/2024, 10:00:00");
    }

    #[tokio::test]
    async fn test_sent_status_only_logs() {
        let gw = gateway();
        let d = dispatcher(gw.clone());
        let report = d.dispatch_at(&payload(status("wamid.abc", "sent", None)), now()).await;
        assert_eq!(report.statuses_logged, 1);
        assert_eq!(report.rows_reconciled, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(gw.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_message_id_is_not_found() {
        let gw = gateway();
        let d = dispatcher(gw.clone());
        let report = d.dispatch_at(&payload(status("wamid.zzz", "failed", None)), now()).await;
        assert_eq!(report.rows_not_found, 1);
        assert!(report.is_clean());
        assert_eq!(gw.write_count(), 0);
    }

    #[tokio::test]
    async fn test_campaign_only_skips_logs_and_messages() {
        let gw = gateway();
        let d = dispatcher(gw.clone());
        let p = payload(json!({
            "messages": [{ "from": "1", "id": "m", "type": "text", "text": { "body": "x" } }],
            "statuses": [{ "id": "wamid.abc", "status": "delivered", "recipient_id": "1" }]
        }));
        let report = d.dispatch_campaign_at(&p, now()).await;
        assert_eq!(report.messages_logged, 0);
        assert_eq!(report.statuses_logged, 0);
        assert_eq!(report.rows_reconciled, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(gw.append_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failures_are_counted_not_raised() {
        let gw = gateway();
        gw.set_failing(true);
        let d = dispatcher(gw.clone());
        let p = payload(json!({
            "messages": [{ "from": "1", "id": "m", "type": "text" }],
            "statuses": [{ "id": "wamid.abc", "status": "read" }]
        }));
        let report = d.dispatch_at(&p, now()).await;
        // message append, status append, campaign read
        assert_eq!(report.failures, 3);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_missing_campaign_key_column_is_a_failure() {
        let t = tables();
        let gw = Arc::new(
            MemoryGateway::new()
                .with_table(t.statuses.clone(), vec![])
                .with_table(t.campaign.clone(), vec![strings(&["Otra"]), strings(&["x"])]),
        );
        let d = dispatcher(gw);
        let report = d.dispatch_at(&payload(status("wamid.abc", "read", None)), now()).await;
        assert_eq!(report.statuses_logged, 1);
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn test_empty_campaign_sheet() {
        let t = tables();
        let gw = Arc::new(
            MemoryGateway::new()
                .with_table(t.statuses.clone(), vec![])
                .with_table(t.campaign.clone(), vec![]),
        );
        let report = dispatcher(gw).dispatch_at(&payload(status("wamid.abc", "read", None)), now()).await;
        assert_eq!(report.empty_tables, 1);
    }

    #[tokio::test]
    async fn test_other_objects_are_ignored() {
        let gw = gateway();
        let d = dispatcher(gw.clone());
        let p: WebhookPayload = serde_json::from_value(json!({
            "object": "page",
            "entry": [{ "changes": [{ "value": { "messages": [{ "from": "1", "id": "m", "type": "text" }] } }] }]
        }))
        .unwrap();
        assert_eq!(d.dispatch_at(&p, now()).await, DispatchReport::default());
        assert_eq!(gw.append_count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_tables_is_idempotent() {
        let gw = Arc::new(MemoryGateway::autocreating());
        let d = dispatcher(gw.clone());
        d.prepare_tables().await;
        d.prepare_tables().await;
        assert_eq!(gw.write_count(), 2);
        assert_eq!(gw.snapshot(&tables().statuses).unwrap()[0][2], "Status");
    }

    #[tokio::test]
    async fn test_prepare_tables_tolerates_missing_sheets() {
        let gw = Arc::new(MemoryGateway::new());
        dispatcher(gw.clone()).prepare_tables().await;
        assert_eq!(gw.write_count(), 0);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "ñ".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), LOG_PREVIEW_CHARS + 1);
        assert_eq!(preview("hola"), "hola");
    }

    #[test]
    fn test_tables_from_config() {
        let mut sheets = SheetsConfig::default();
        assert!(DispatchTables::from_config(&sheets).is_err());
        sheets.spreadsheet_id = "main".into();
        let t = DispatchTables::from_config(&sheets).unwrap();
        assert_eq!(t.messages, TableRef::new("main", "Respuestas"));
        assert_eq!(t.campaign, TableRef::new("main", "Hoja1"));
    }

    #[tokio::test]
    async fn test_missing_spreadsheet_fails_each_event_without_io() {
        let gw = gateway();
        let d = Dispatcher::from_config(gw.clone(), &SheetsConfig::default(), chrono_tz::America::Bogota);
        assert!(matches!(d.tables(), Err(RelayError::Config(reason)) if reason.contains("SPREADSHEET_ID")));

        let p = payload(json!({
            "messages": [{ "from": "573001112233", "id": "wamid.in", "type": "text", "text": { "body": "Hola" } }],
            "statuses": [{ "id": "wamid.abc", "status": "delivered", "recipient_id": "573001112233" }]
        }));
        let report = d.dispatch_at(&p, now()).await;
        assert_eq!(report.failures, 2);
        assert_eq!(report.messages_logged + report.statuses_logged + report.rows_reconciled, 0);

        d.prepare_tables().await;
        assert_eq!(gw.append_count(), 0);
        assert_eq!(gw.write_count(), 0);
    }
}
