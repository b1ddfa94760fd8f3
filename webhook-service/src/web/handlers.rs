//! HTTP endpoint handlers.
//!
//! The webhook handler runs every request through the same pipeline:
//! 1. Rate limit the source
//! 2. Verify the body signature
//! 3. Validate the Telegram update
//! 4. Dispatch to the AI agent and echo its reply

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::dispatch::{
    Dispatcher, HttpResponder, Responder, ResponderHealth, SimulatedResponder,
};
use crate::error::WebhookError;
use crate::ratelimit::{FixedWindowRateLimiter, RateDecision};
use crate::stats::{Stats, StatsSnapshot};
use crate::telegram::{parse_update, ValidatedMessage};
use crate::web::signature::{verify_signature, SignatureCheck};
use crate::web::source::ClientSource;
use crate::Config;

const SERVICE_NAME: &str = "Telegram Webhook Service";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<FixedWindowRateLimiter>,
    pub stats: Arc<Stats>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Build state with the responder chosen by configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let responder: Arc<dyn Responder> = match &config.responder_url {
            Some(url) => Arc::new(HttpResponder::new(
                url.clone(),
                config.responder_api_key.clone(),
            )?),
            None => Arc::new(SimulatedResponder::new()),
        };
        Ok(Self::new(config, responder))
    }

    pub fn new(config: Config, responder: Arc<dyn Responder>) -> Self {
        let limiter = FixedWindowRateLimiter::new(
            config.rate_limit,
            config.rate_limit_window(),
            config.rate_limit_max_sources,
        );
        Self::with_limiter(config, limiter, responder)
    }

    pub fn with_limiter(
        config: Config,
        limiter: FixedWindowRateLimiter,
        responder: Arc<dyn Responder>,
    ) -> Self {
        let dispatcher = Dispatcher::new(responder, config.request_timeout());
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            stats: Arc::new(Stats::new()),
            dispatcher,
        }
    }
}

// =============================================================================
// Health and Stats
// =============================================================================

/// Root response.
#[derive(Serialize)]
pub struct ServiceInfo {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Minimal liveness banner.
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "healthy",
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
    })
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
    pub components: HealthComponents,
}

#[derive(Serialize)]
pub struct HealthComponents {
    pub ai_agent: ResponderHealth,
    pub webhook_processor: StatsSnapshot,
}

/// Health check endpoint. Reads state only.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: Utc::now(),
        components: HealthComponents {
            ai_agent: state.dispatcher.responder_health(),
            webhook_processor: state.stats.snapshot(),
        },
    })
}

/// Statistics response.
#[derive(Serialize)]
pub struct StatsResponse {
    pub webhook_stats: StatsSnapshot,
    pub ai_agent_stats: ResponderHealth,
    pub rate_limiter: RateLimiterStats,
}

#[derive(Serialize)]
pub struct RateLimiterStats {
    pub limit: u32,
    pub window_secs: u64,
    pub tracked_sources: usize,
}

/// Statistics endpoint.
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        webhook_stats: state.stats.snapshot(),
        ai_agent_stats: state.dispatcher.responder_health(),
        rate_limiter: RateLimiterStats {
            limit: state.limiter.limit(),
            window_secs: state.limiter.window().as_secs(),
            tracked_sources: state.limiter.tracked_sources(),
        },
    })
}

// =============================================================================
// Telegram Webhook
// =============================================================================

/// Summary of a processed webhook.
#[derive(Debug, Serialize)]
pub struct ProcessedData {
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub message_type: &'static str,
    pub sent_to_ai: bool,
    pub ai_response: Option<String>,
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
    pub processed_data: ProcessedData,
}

/// Telegram webhook endpoint.
pub async fn webhook(
    State(state): State<AppState>,
    source: ClientSource,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookError> {
    state.stats.record_received();

    info!(
        source = %source.as_str(),
        body_length = body.len(),
        "webhook_received"
    );

    match process_webhook(&state, &source, &headers, &body).await {
        Ok(response) => {
            state.stats.record_accepted();
            info!(
                source = %source.as_str(),
                update_id = response.processed_data.update_id,
                "webhook_processed"
            );
            Ok(Json(response))
        }
        Err(e) => {
            match e.rejection() {
                Some(reason) => {
                    state.stats.record_rejected(reason);
                    warn!(
                        source = %source.as_str(),
                        status = e.status(),
                        reason = %e,
                        "webhook_rejected"
                    );
                }
                None => {
                    state.stats.record_errored();
                    error!(
                        source = %source.as_str(),
                        status = e.status(),
                        reason = %e,
                        "webhook_failed"
                    );
                }
            }
            Err(e)
        }
    }
}

async fn process_webhook(
    state: &AppState,
    source: &ClientSource,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookResponse, WebhookError> {
    if let RateDecision::Reject { retry_after } = state.limiter.check(source.as_str()) {
        return Err(WebhookError::RateLimited { retry_after });
    }

    if body.is_empty() {
        return Err(WebhookError::EmptyBody);
    }

    let provided = headers
        .get(state.config.signature_header.as_str())
        .and_then(|v| v.to_str().ok());

    match verify_signature(&state.config.webhook_secret, body, provided) {
        SignatureCheck::Valid => {}
        SignatureCheck::Missing => return Err(WebhookError::MissingSignature),
        SignatureCheck::Invalid => return Err(WebhookError::InvalidSignature),
    }

    let message = parse_update(body)?;
    log_message(source, &message);

    let reply = state.dispatcher.dispatch(&message).await?;

    Ok(WebhookResponse {
        success: true,
        message: "Webhook processed successfully",
        timestamp: Utc::now(),
        processed_data: ProcessedData {
            update_id: message.update_id(),
            chat_id: message.chat_id(),
            user_id: message.sender_id(),
            message_type: message.message_type(),
            sent_to_ai: true,
            ai_response: reply.response_text,
        },
    })
}

fn log_message(source: &ClientSource, message: &ValidatedMessage) {
    info!(
        source = %source.as_str(),
        update_id = message.update_id(),
        chat_id = message.chat_id(),
        chat_type = %message.chat_type(),
        sender_id = ?message.sender_id(),
        message_type = message.message_type(),
        has_text = message.text().is_some(),
        sent_at = %message.sent_at(),
        "webhook_validated"
    );
}
