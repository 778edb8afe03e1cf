// wa-relay: Configuration
//
// RelayConfig is read from an optional TOML file and then overridden by
// environment variables, so a deployment can run from env alone:
//
//   PORT, BIND_ADDRESS, VERIFY_TOKEN, APP_SECRET, STATIC_DIR, RELAY_BACKEND,
//   RELAY_TIMEZONE, SPREADSHEET_ID, CAMPAIGN_SPREADSHEET_ID, MESSAGES_SHEET,
//   STATUSES_SHEET, CAMPAIGN_SHEET, CAMPAIGN_KEY_COLUMN,
//   GOOGLE_SERVICE_ACCOUNT_JSON_BASE64, GOOGLE_SERVICE_ACCOUNT_JSON,
//   API_VERSION, PHONE_NUMBER_ID, WABA_TOKEN, GRAPH_BASE_URL,
//   DEFAULT_LANGUAGE_CODE

use crate::campaign::CampaignColumns;
use crate::error::{RelayError, RelayResult};
use crate::table::TableRef;
use chrono_tz::Tz;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "wa-relay.toml";
/// Spreadsheet id the in-memory backend falls back to when none is set.
pub const MEMORY_SPREADSHEET: &str = "memory";

// ── Sections ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Google,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// Spreadsheet holding the campaign sheet; empty means `spreadsheet_id`.
    pub campaign_spreadsheet_id: String,
    pub messages_sheet: String,
    pub statuses_sheet: String,
    pub campaign_sheet: String,
    pub campaign: CampaignColumns,
    pub service_account_json_base64: Option<String>,
    pub service_account_json: Option<String>,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        SheetsConfig {
            spreadsheet_id: String::new(),
            campaign_spreadsheet_id: String::new(),
            messages_sheet: "Respuestas".into(),
            statuses_sheet: "Estados".into(),
            campaign_sheet: "Hoja1".into(),
            campaign: CampaignColumns::default(),
            service_account_json_base64: None,
            service_account_json: None,
        }
    }
}

impl SheetsConfig {
    fn require_spreadsheet(&self) -> RelayResult<&str> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(RelayError::Config("SPREADSHEET_ID is not set".into()));
        }
        Ok(&self.spreadsheet_id)
    }

    pub fn messages_table(&self) -> RelayResult<TableRef> {
        Ok(TableRef::new(self.require_spreadsheet()?, &self.messages_sheet))
    }

    pub fn statuses_table(&self) -> RelayResult<TableRef> {
        Ok(TableRef::new(self.require_spreadsheet()?, &self.statuses_sheet))
    }

    pub fn campaign_table(&self) -> RelayResult<TableRef> {
        let id = if self.campaign_spreadsheet_id.trim().is_empty() {
            self.require_spreadsheet()?
        } else {
            &self.campaign_spreadsheet_id
        };
        Ok(TableRef::new(id, &self.campaign_sheet))
    }

    /// Any sheet of the main spreadsheet (or `spreadsheet` when given).
    pub fn table(&self, spreadsheet: Option<&str>, sheet: &str) -> RelayResult<TableRef> {
        match spreadsheet {
            Some(id) => Ok(TableRef::new(id, sheet)),
            None => Ok(TableRef::new(self.require_spreadsheet()?, sheet)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub api_version: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub graph_base_url: String,
    pub default_language_code: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        WhatsAppConfig {
            api_version: "v22.0".into(),
            phone_number_id: String::new(),
            access_token: String::new(),
            graph_base_url: "https://graph.facebook.com".into(),
            default_language_code: "es_CO".into(),
        }
    }
}

impl WhatsAppConfig {
    pub fn is_configured(&self) -> bool {
        !self.phone_number_id.is_empty() && !self.access_token.is_empty()
    }
}

// ── Root config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_address: String,
    pub port: u16,
    pub verify_token: String,
    /// Enables X-Hub-Signature-256 checks when set.
    pub app_secret: Option<String>,
    pub static_dir: PathBuf,
    pub backend: Backend,
    /// IANA zone for sheet timestamps.
    pub timezone: String,
    pub sheets: SheetsConfig,
    pub whatsapp: WhatsAppConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            bind_address: "0.0.0.0".into(),
            port: 3000,
            verify_token: "verify_token_demo".into(),
            app_secret: None,
            static_dir: PathBuf::from("public"),
            backend: Backend::Google,
            timezone: "America/Bogota".into(),
            sheets: SheetsConfig::default(),
            whatsapp: WhatsAppConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load `path` (or `wa-relay.toml` if it exists), then apply process env.
    pub fn load(path: Option<&Path>) -> RelayResult<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(path, &env)
    }

    pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> RelayResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => RelayConfig::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> RelayResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&text)
            .map_err(|e| RelayError::Config(format!("{}: {}", path.display(), e)))?;
        info!("[config] Loaded {}", path.display());
        Ok(config)
    }

    /// Override fields from environment variables. Blank values are ignored.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> RelayResult<()> {
        let get = |key: &str| env_value(env, key);

        if let Some(v) = get("PORT") {
            self.port = v
                .parse()
                .map_err(|_| RelayError::Config(format!("PORT is not a valid port: {}", v)))?;
        }
        if let Some(v) = get("RELAY_BACKEND") {
            self.backend = match v {
                "google" => Backend::Google,
                "memory" => Backend::Memory,
                other => return Err(RelayError::Config(format!("Unknown backend '{}'", other))),
            };
        }

        let set = |key: &str, field: &mut String| {
            if let Some(v) = get(key) {
                *field = v.to_string();
            }
        };
        set("BIND_ADDRESS", &mut self.bind_address);
        set("VERIFY_TOKEN", &mut self.verify_token);
        set("RELAY_TIMEZONE", &mut self.timezone);
        set("SPREADSHEET_ID", &mut self.sheets.spreadsheet_id);
        set("CAMPAIGN_SPREADSHEET_ID", &mut self.sheets.campaign_spreadsheet_id);
        set("MESSAGES_SHEET", &mut self.sheets.messages_sheet);
        set("STATUSES_SHEET", &mut self.sheets.statuses_sheet);
        set("CAMPAIGN_SHEET", &mut self.sheets.campaign_sheet);
        set("CAMPAIGN_KEY_COLUMN", &mut self.sheets.campaign.key);
        set("API_VERSION", &mut self.whatsapp.api_version);
        set("PHONE_NUMBER_ID", &mut self.whatsapp.phone_number_id);
        set("WABA_TOKEN", &mut self.whatsapp.access_token);
        set("GRAPH_BASE_URL", &mut self.whatsapp.graph_base_url);
        set("DEFAULT_LANGUAGE_CODE", &mut self.whatsapp.default_language_code);

        if let Some(v) = get("APP_SECRET") {
            self.app_secret = Some(v.to_string());
        }
        if let Some(v) = get("STATIC_DIR") {
            self.static_dir = PathBuf::from(v);
        }
        if let Some(v) = get("GOOGLE_SERVICE_ACCOUNT_JSON_BASE64") {
            self.sheets.service_account_json_base64 = Some(v.to_string());
        }
        if let Some(v) = get("GOOGLE_SERVICE_ACCOUNT_JSON") {
            self.sheets.service_account_json = Some(v.to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> RelayResult<()> {
        self.tz()?;
        if self.verify_token.is_empty() {
            return Err(RelayError::Config("verify_token must not be empty".into()));
        }
        Ok(())
    }

    pub fn tz(&self) -> RelayResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| RelayError::Config(format!("Unknown timezone '{}'", self.timezone)))
    }

    /// Sheet settings as the selected backend sees them: the memory backend
    /// needs no real spreadsheet, so an empty id becomes `MEMORY_SPREADSHEET`.
    pub fn effective_sheets(&self) -> SheetsConfig {
        let mut sheets = self.sheets.clone();
        if self.backend == Backend::Memory && sheets.spreadsheet_id.trim().is_empty() {
            sheets.spreadsheet_id = MEMORY_SPREADSHEET.into();
        }
        sheets
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn env_value<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

// ── Tests ──────────────────────────────────────────────────────────────
