//! Web server module for handling inbound Telegram webhooks.
//!
//! This module provides a thin web server that:
//! - Rate limits each client source
//! - Verifies the HMAC signature of the raw body
//! - Validates the update and dispatches it to the AI agent
//! - Exposes `/health` and `/stats`

pub mod handlers;
pub mod router;
pub mod signature;
pub mod source;

pub use handlers::{
    health, root, stats, webhook, AppState, HealthResponse, ProcessedData, StatsResponse,
    WebhookResponse,
};
pub use router::build_router;
pub use signature::{verify_signature, SignatureCheck};
pub use source::ClientSource;
