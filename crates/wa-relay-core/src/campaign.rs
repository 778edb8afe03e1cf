// wa-relay: Campaign Status Markers
// Maps a delivery status onto the recognised columns of the outbound
// campaign sheet.

use crate::reconciler::UpdateRequest;
use crate::table::TableRef;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Delivery status ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
    Other(String),
}

impl DeliveryStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "sent" => DeliveryStatus::Sent,
            "delivered" => DeliveryStatus::Delivered,
            "read" => DeliveryStatus::Read,
            "failed" => DeliveryStatus::Failed,
            other => DeliveryStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Campaign columns ───────────────────────────────────────────────────

/// Column names and marker labels of the campaign sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignColumns {
    pub key: String,
    pub delivery_status: String,
    pub delivery_time: String,
    pub read_status: String,
    pub read_time: String,
    pub delivered_label: String,
    pub read_label: String,
    pub failed_label: String,
}

impl Default for CampaignColumns {
    fn default() -> Self {
        CampaignColumns {
            key: "ID Mensaje".into(),
            delivery_status: "Estado Entrega".into(),
            delivery_time: "Hora Entrega".into(),
            read_status: "Estado Lectura".into(),
            read_time: "Hora Lectura".into(),
            delivered_label: "Entregado".into(),
            read_label: "Leído".into(),
            failed_label: "Fallido".into(),
        }
    }
}

impl CampaignColumns {
    /// Marker updates for `status`, or `None` when the status leaves the
    /// campaign row alone (`sent`, unknown values).
    pub fn updates_for(&self, status: &DeliveryStatus, at: &str) -> Option<Vec<(String, String)>> {
        let (status_col, time_col, label) = match status {
            DeliveryStatus::Delivered => (&self.delivery_status, &self.delivery_time, &self.delivered_label),
            DeliveryStatus::Read => (&self.read_status, &self.read_time, &self.read_label),
            DeliveryStatus::Failed => (&self.delivery_status, &self.delivery_time, &self.failed_label),
            DeliveryStatus::Sent | DeliveryStatus::Other(_) => return None,
        };
        Some(vec![(status_col.clone(), label.clone()), (time_col.clone(), at.to_string())])
    }

    /// Full reconcile request against `table` keyed by `message_id`.
    pub fn request_for(
        &self,
        table: &TableRef,
        message_id: &str,
        status: &DeliveryStatus,
        at: &str,
    ) -> Option<UpdateRequest> {
        let updates = self.updates_for(status, at)?;
        Some(UpdateRequest {
            table: table.clone(),
            key_column: self.key.clone(),
            key_value: message_id.to_string(),
            updates,
        })
    }
}
