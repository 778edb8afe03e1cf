// wa-relay: WhatsApp Cloud API Outbound Client
// send_text / send_template against
//   POST {graph_base}/{api_version}/{phone_number_id}/messages

use crate::config::WhatsAppConfig;
use crate::error::{RelayError, RelayResult};
use log::{info, warn};
use serde_json::{json, Value};
use std::time::Duration;

const SEND_TIMEOUT_SECS: u64 = 30;

// ── Outbound messages ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Free-form text (only deliverable inside the 24 h customer window).
    Text { to: String, body: String },
    /// Pre-approved template.
    Template {
        to: String,
        name: String,
        language_code: String,
        components: Option<Value>,
    },
}

impl OutboundMessage {
    pub fn text(to: impl Into<String>, body: impl Into<String>) -> Self {
        OutboundMessage::Text { to: to.into(), body: body.into() }
    }

    pub fn template(
        to: impl Into<String>,
        name: impl Into<String>,
        language_code: impl Into<String>,
        components: Option<Value>,
    ) -> Self {
        OutboundMessage::Template {
            to: to.into(),
            name: name.into(),
            language_code: language_code.into(),
            components,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            OutboundMessage::Text { to, .. } | OutboundMessage::Template { to, .. } => to,
        }
    }

    pub fn validate(&self) -> RelayResult<()> {
        let blank = |s: &str| s.trim().is_empty();
        match self {
            OutboundMessage::Text { to, body } if blank(to) || blank(body) => {
                Err(RelayError::Validation("Missing to or body".into()))
            }
            OutboundMessage::Template { to, name, .. } if blank(to) || blank(name) => {
                Err(RelayError::Validation("Missing to or name".into()))
            }
            OutboundMessage::Template { components: Some(c), .. } if !c.is_array() && !c.is_null() => {
                Err(RelayError::Validation("components must be an array".into()))
            }
            _ => Ok(()),
        }
    }

    /// Cloud API request body.
    pub fn to_payload(&self) -> Value {
        match self {
            OutboundMessage::Text { to, body } => json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body },
            }),
            OutboundMessage::Template { to, name, language_code, components } => {
                let mut template = json!({
                    "name": name,
                    "language": { "code": language_code },
                });
                if let Some(c) = components.as_ref().filter(|c| !c.is_null()) {
                    template["components"] = c.clone();
                }
                json!({
                    "messaging_product": "whatsapp",
                    "to": to,
                    "type": "template",
                    "template": template,
                })
            }
        }
    }
}

// ── Client ─────────────────────────────────────────────────────────────

pub struct WhatsAppClient {
    http: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    pub fn new(http: reqwest::Client, config: WhatsAppConfig) -> Self {
        if !config.is_configured() {
            warn!("[whatsapp] PHONE_NUMBER_ID or WABA_TOKEN missing, outbound sends will fail");
        }
        WhatsAppClient { http, config }
    }

    pub fn default_language_code(&self) -> &str {
        &self.config.default_language_code
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.graph_base_url.trim_end_matches('/'),
            self.config.api_version,
            self.config.phone_number_id
        )
    }

    pub async fn send_text(&self, to: &str, body: &str) -> RelayResult<Value> {
        self.send(&OutboundMessage::text(to, body)).await
    }

    pub async fn send_template(
        &self,
        to: &str,
        name: &str,
        language_code: Option<&str>,
        components: Option<Value>,
    ) -> RelayResult<Value> {
        let lang = language_code.unwrap_or(&self.config.default_language_code);
        self.send(&OutboundMessage::template(to, name, lang, components)).await
    }

    /// Validate, post, and return the API's JSON reply.
    pub async fn send(&self, message: &OutboundMessage) -> RelayResult<Value> {
        message.validate()?;
        if !self.config.is_configured() {
            return Err(RelayError::Config("PHONE_NUMBER_ID and WABA_TOKEN must be set to send messages".into()));
        }

        let resp = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&message.to_payload())
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let body: Value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

        if status >= 400 {
            warn!("[whatsapp] Send to {} failed ({})", message.recipient(), status);
            return Err(if status == 429 || status >= 500 {
                RelayError::Transient(format!("WhatsApp API unavailable ({})", status))
            } else {
                RelayError::upstream("whatsapp", status, body)
            });
        }

        let message_id = body["messages"][0]["id"].as_str().unwrap_or("?");
        info!("[whatsapp] Sent to {} (msg_id={})", message.recipient(), message_id);
        Ok(body)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn client(phone: &str, token: &str) -> WhatsAppClient {
        WhatsAppClient::new(
            reqwest::Client::new(),
            WhatsAppConfig {
                phone_number_id: phone.into(),
                access_token: token.into(),
                ..WhatsAppConfig::default()
            },
        )
    }

    #[test]
    fn test_text_payload() {
        let p = OutboundMessage::text("573001112233", "Hola").to_payload();
        assert_eq!(
            p,
            json!({
                "messaging_product": "whatsapp",
                "to": "573001112233",
                "type": "text",
                "text": { "body": "Hola" }
            })
        );
    }

    #[test]
    fn test_template_payload_without_components() {
        let p = OutboundMessage::template("1", "bienvenida", "es_CO", None).to_payload();
        assert_eq!(p["type"], "template");
        assert_eq!(p["template"]["name"], "bienvenida");
        assert_eq!(p["template"]["language"]["code"], "es_CO");
        assert!(p["template"].get("components").is_none());
    }

    #[test]
    fn test_template_payload_with_components() {
        let components = json!([{ "type": "body", "parameters": [{ "type": "text", "text": "Ana" }] }]);
        let p = OutboundMessage::template("1", "saludo", "en_US", Some(components.clone())).to_payload();
        assert_eq!(p["template"]["components"], components);
    }

    #[test]
    fn test_validation() {
        assert!(OutboundMessage::text("", "x").validate().is_err());
        assert!(OutboundMessage::text("1", "  ").validate().is_err());
        assert!(OutboundMessage::template("1", "", "es_CO", None).validate().is_err());
        assert!(OutboundMessage::template("1", "t", "es_CO", Some(json!("bad"))).validate().is_err());
        assert!(OutboundMessage::template("1", "t", "es_CO", Some(json!([]))).validate().is_ok());
    }

    #[test]
    fn test_messages_url() {
        let c = client("12345", "tok");
        assert_eq!(c.messages_url(), "https://graph.facebook.com/v22.0/12345/messages");
    }

    #[tokio::test]
    async fn test_send_without_credentials_is_config_error() {
        let c = client("", "");
        let err = c.send_text("1", "hola").await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[tokio::test]
    async fn test_send_validates_before_config() {
        let c = client("", "");
        let err = c.send_template("1", "", None, None).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }
}
