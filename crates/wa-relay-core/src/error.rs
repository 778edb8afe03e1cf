// ── wa-relay: Error Types ──────────────────────────────────────────────────
// Single canonical error enum for the relay, built with `thiserror`.
//
// Design rules:
//   • Variants follow the failure taxonomy of the gateway and the send API
//     (Auth, Schema, TableNotFound, Transient, Validation, Upstream…).
//   • A key that matches no row is NOT an error; see `ReconcileOutcome`.
//   • No variant carries secret material (tokens, private keys) in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing, malformed or rejected credentials.
    #[error("Auth error: {0}")]
    Auth(String),

    /// An expected column is absent from a table's header row.
    #[error("Schema error: column '{column}' not found in {table}")]
    Schema { table: String, column: String },

    /// The spreadsheet or sheet does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Network failure, timeout, rate limit or 5xx. Never retried.
    #[error("Transient error: {0}")]
    Transient(String),

    /// Malformed outbound-send request (surfaced as HTTP 400).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote API rejected the call with a non-retryable status.
    /// `body` keeps the upstream JSON so it can be relayed to the caller.
    #[error("Upstream error: {service} ({status}): {}", upstream_message(.body))]
    Upstream {
        service: String,
        status: u16,
        body: serde_json::Value,
    },

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure (config file, replay payloads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn upstream_message(body: &serde_json::Value) -> String {
    body["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

// ── Convenience constructors ───────────────────────────────────────────────

impl RelayError {
    /// Create a schema error for a missing column.
    pub fn schema(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Schema { table: table.into(), column: column.into() }
    }

    /// Create an upstream error with service name, HTTP status and body.
    pub fn upstream(service: impl Into<String>, status: u16, body: serde_json::Value) -> Self {
        Self::Upstream { service: service.into(), status, body }
    }

    /// True for failures that might succeed if tried again later.
    /// The relay itself never retries; this only steers logging.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

// Every reqwest failure that reaches us is a transport problem (connect,
// timeout, body read). Status-code failures are classified separately.
impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        RelayError::Transient(e.without_url().to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All relay operations return this type.
pub type RelayResult<T> = Result<T, RelayError>;

// ── Tests ──────────────────────────────────────────────────────────────────
