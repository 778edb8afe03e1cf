// wa-relay: HTTP Surface
//
// Routes:
//   GET  /healthz          liveness probe
//   GET  /webhook          Meta subscription handshake (hub.challenge echo)
//   POST /webhook          ack 200, then full dispatch on a spawned task
//   POST /webhook-envios   ack 200, then campaign-only dispatch
//   POST /send-text        outbound text message
//   POST /send-template    outbound template message
//   GET  /static/*         files from the static dir, cached for a day
//
// Deliveries are acknowledged before any spreadsheet work starts; whatever
// happens afterwards is only logged. When an app secret is configured, a
// delivery without a valid X-Hub-Signature-256 gets 401 and is not processed.

use crate::signature::{token_matches, verify_signature, SIGNATURE_HEADER};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use wa_relay_core::events::{string_or_number, WebhookPayload};
use wa_relay_core::{Dispatcher, RelayConfig, RelayError, RelayResult, SheetGateway, WhatsAppClient};

pub const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
const STATIC_CACHE_CONTROL: &str = "public, max-age=86400";

// ── State ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub whatsapp: Arc<WhatsAppClient>,
    pub verify_token: String,
    pub app_secret: Option<String>,
}

impl AppState {
    pub fn from_config(
        config: &RelayConfig,
        gateway: Arc<dyn SheetGateway>,
        http: reqwest::Client,
    ) -> RelayResult<Self> {
        let sheets = config.effective_sheets();
        Ok(AppState {
            dispatcher: Arc::new(Dispatcher::from_config(gateway, &sheets, config.tz()?)),
            whatsapp: Arc::new(WhatsAppClient::new(http, config.whatsapp.clone())),
            verify_token: config.verify_token.clone(),
            app_secret: config.app_secret.clone(),
        })
    }
}

// ── Router ─────────────────────────────────────────────────────────────

pub fn router(state: AppState, static_dir: &Path) -> Router {
    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE_CONTROL),
        ))
        .service(ServeDir::new(static_dir));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/webhook", get(verify_subscription).post(receive_webhook))
        .route("/webhook-envios", post(receive_campaign_webhook))
        .route("/send-text", post(send_text))
        .route("/send-template", post(send_template))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// One line per request: `METHOD path status - N ms`.
async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let resp = next.run(req).await;
    info!(
        "[http] {} {} {} - {} ms",
        method,
        path,
        resp.status().as_u16(),
        started.elapsed().as_millis()
    );
    resp
}

async fn healthz() -> &'static str {
    "ok"
}

// ── Webhook ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_subscription(State(state): State<AppState>, Query(q): Query<VerifyQuery>) -> Response {
    let subscribed = q.mode.as_deref() == Some("subscribe")
        && q.verify_token.as_deref().is_some_and(|t| token_matches(&state.verify_token, t));
    if subscribed {
        info!("[webhook] Subscription verified");
        (StatusCode::OK, q.challenge.unwrap_or_default()).into_response()
    } else {
        warn!("[webhook] Subscription verification rejected");
        (StatusCode::FORBIDDEN, "Forbidden").into_response()
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Full,
    Campaign,
}

async fn receive_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    accept_delivery(state, &headers, body, Route::Full)
}

async fn receive_campaign_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    accept_delivery(state, &headers, body, Route::Campaign)
}

fn accept_delivery(state: AppState, headers: &HeaderMap, body: Bytes, route: Route) -> Response {
    if let Some(secret) = state.app_secret.as_deref() {
        let given = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, given) {
            warn!("[webhook] Rejected delivery with bad or missing signature");
            return (StatusCode::UNAUTHORIZED, "Invalid signature").into_response();
        }
    }

    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => {
            let dispatcher = state.dispatcher.clone();
            tokio::spawn(async move {
                match route {
                    Route::Full => dispatcher.dispatch(&payload).await,
                    Route::Campaign => dispatcher.dispatch_campaign(&payload).await,
                };
            });
        }
        Err(e) => warn!("[webhook] Unparseable delivery ({} bytes): {}", body.len(), e),
    }

    (StatusCode::OK, "OK").into_response()
}

// ── Outbound sends ─────────────────────────────────────────────────────

/// JSON error reply for the send endpoints.
pub struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            RelayError::Validation(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response(),
            RelayError::Upstream { body, .. } => (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": other.to_string() })),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendTextBody {
    #[serde(deserialize_with = "string_or_number")]
    to: String,
    body: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SendTemplateBody {
    #[serde(deserialize_with = "string_or_number")]
    to: String,
    name: String,
    language_code: Option<String>,
    components: Option<Value>,
}

/// Bodies that are not JSON objects read as empty and fail validation.
fn lenient<T: Default + for<'de> Deserialize<'de>>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        debug!("[http] Ignoring malformed JSON body: {}", e);
        T::default()
    })
}

async fn send_text(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let req: SendTextBody = lenient(&body);
    let reply = state.whatsapp.send_text(&req.to, &req.body).await?;
    Ok(Json(reply))
}

async fn send_template(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let req: SendTemplateBody = lenient(&body);
    let language = req.language_code.as_deref().filter(|l| !l.trim().is_empty());
    let reply = state
        .whatsapp
        .send_template(&req.to, &req.name, language, req.components)
        .await?;
    Ok(Json(reply))
}
