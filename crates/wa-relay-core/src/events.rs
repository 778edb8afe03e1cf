// wa-relay: Webhook Event Model
//
// Envelope types for the WhatsApp Business webhook
//   { object, entry: [{ changes: [{ value: { messages?, statuses?, contacts? } }] }] }
// and the two relay events extracted from it.
//
// Messages and statuses are kept as raw JSON inside the envelope and decoded
// one by one, so a single malformed entry fails alone instead of rejecting
// the whole delivery. The raw JSON is also what lands in the `Raw` column.

use crate::campaign::DeliveryStatus;
use crate::error::RelayResult;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `object` value of WhatsApp Business Account deliveries.
pub const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

pub const MESSAGE_LOG_HEADERS: [&str; 7] = [
    "Fecha/Hora (Bogotá)",
    "wa_id",
    "Nombre",
    "Tipo",
    "Mensaje",
    "Message ID",
    "Raw",
];

pub const STATUS_LOG_HEADERS: [&str; 9] = [
    "Fecha/Hora (Bogotá)",
    "wa_id",
    "Status",
    "Message ID",
    "Conversation ID",
    "Category",
    "Pricing Model",
    "Error Code",
    "Raw",
];

pub fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ── Envelope ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookPayload {
    pub object: String,
    pub entry: Vec<WebhookEntry>,
}

impl WebhookPayload {
    pub fn is_business_account(&self) -> bool {
        self.object == BUSINESS_ACCOUNT_OBJECT
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookEntry {
    pub id: String,
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookChange {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeValue {
    pub messaging_product: String,
    pub contacts: Vec<Contact>,
    pub messages: Vec<Value>,
    pub statuses: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub wa_id: String,
    pub profile: ContactProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactProfile {
    pub name: String,
}

// ── Decoded entries ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageFields {
    from: String,
    id: String,
    #[serde(deserialize_with = "string_or_number")]
    timestamp: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusFields {
    id: String,
    status: String,
    #[serde(deserialize_with = "string_or_number")]
    timestamp: String,
    recipient_id: String,
    conversation: ConversationFields,
    pricing: PricingFields,
    errors: Vec<StatusErrorFields>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConversationFields {
    id: String,
    origin: OriginFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OriginFields {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PricingFields {
    pricing_model: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusErrorFields {
    #[serde(deserialize_with = "string_or_number")]
    code: String,
}

/// Accept `"123"`, `123` or null for fields the platform has sent both ways.
pub fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// ── Relay events ───────────────────────────────────────────────────────

/// An inbound customer message, ready for the message log.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub from: String,
    pub message_id: String,
    pub kind: String,
    pub text: String,
    pub contact_name: String,
    pub timestamp: Option<String>,
    pub raw: Value,
}

impl MessageRecord {
    pub fn from_raw(raw: &Value, contacts: &[Contact]) -> RelayResult<Self> {
        let fields: MessageFields = serde_json::from_value(raw.clone())?;
        let contact_name = contacts
            .iter()
            .find(|c| c.wa_id == fields.from)
            .or_else(|| contacts.first())
            .map(|c| c.profile.name.clone())
            .unwrap_or_default();

        Ok(MessageRecord {
            text: extract_text(&fields.kind, raw),
            from: fields.from,
            message_id: fields.id,
            kind: fields.kind,
            contact_name,
            timestamp: non_empty(fields.timestamp),
            raw: raw.clone(),
        })
    }

    /// Row in `MESSAGE_LOG_HEADERS` order.
    pub fn log_row(&self, received_at: &str) -> Vec<String> {
        vec![
            received_at.to_string(),
            self.from.clone(),
            self.contact_name.clone(),
            self.kind.clone(),
            self.text.clone(),
            self.message_id.clone(),
            self.raw.to_string(),
        ]
    }
}

/// Human-readable content of a message:
///   text        → text.body
///   interactive → button_reply.title | list_reply.title | interactive JSON
///   anything    → JSON of the object named by `type` (or `{}`)
pub fn extract_text(kind: &str, raw: &Value) -> String {
    match kind {
        "text" => raw["text"]["body"].as_str().unwrap_or_default().to_string(),
        "interactive" => {
            let interactive = &raw["interactive"];
            interactive["button_reply"]["title"]
                .as_str()
                .or_else(|| interactive["list_reply"]["title"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| object_json(interactive))
        }
        other => object_json(&raw[other]),
    }
}

fn object_json(v: &Value) -> String {
    if v.is_null() { "{}".to_string() } else { v.to_string() }
}

/// A delivery-status change for a message we sent.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub recipient_id: String,
    pub status: DeliveryStatus,
    pub message_id: String,
    pub conversation_id: String,
    pub category: String,
    pub pricing_model: String,
    pub error_code: String,
    pub timestamp: Option<String>,
    pub raw: Value,
}

impl StatusRecord {
    pub fn from_raw(raw: &Value) -> RelayResult<Self> {
        let fields: StatusFields = serde_json::from_value(raw.clone())?;
        Ok(StatusRecord {
            recipient_id: fields.recipient_id,
            status: DeliveryStatus::parse(&fields.status),
            message_id: fields.id,
            conversation_id: fields.conversation.id,
            category: fields.conversation.origin.kind,
            pricing_model: fields.pricing.pricing_model,
            error_code: fields.errors.into_iter().next().map(|e| e.code).unwrap_or_default(),
            timestamp: non_empty(fields.timestamp),
            raw: raw.clone(),
        })
    }

    /// Row in `STATUS_LOG_HEADERS` order.
    pub fn log_row(&self, received_at: &str) -> Vec<String> {
        vec![
            received_at.to_string(),
            self.recipient_id.clone(),
            self.status.to_string(),
            self.message_id.clone(),
            self.conversation_id.clone(),
            self.category.clone(),
            self.pricing_model.clone(),
            self.error_code.clone(),
            self.raw.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    MessageReceived(MessageRecord),
    StatusChanged(StatusRecord),
}

/// Flatten a delivery into events, in payload order (per change: messages
/// first, then statuses). Entries that fail to decode yield `Err` in place.
pub fn classify(payload: &WebhookPayload) -> Vec<RelayResult<RelayEvent>> {
    let mut events = Vec::new();
    for change in payload.entry.iter().flat_map(|e| e.changes.iter()) {
        let value = &change.value;
        for raw in &value.messages {
            events.push(MessageRecord::from_raw(raw, &value.contacts).map(RelayEvent::MessageReceived));
        }
        for raw in &value.statuses {
            events.push(StatusRecord::from_raw(raw).map(RelayEvent::StatusChanged));
        }
    }
    events
}

// ── Tests ──────────────────────────────────────────────────────────────
