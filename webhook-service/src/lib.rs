//! Telehook - signed Telegram webhook receiver.
//!
//! Receives Telegram bot updates over HTTP, checks their signature and the
//! per-source request rate, validates the payload and hands the message to
//! an AI agent.
//!
//! ## Architecture
//!
//! ```text
//! POST /webhook → Rate Limiter → Signature → Telegram parser → Dispatcher → Responder
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ratelimit;
pub mod stats;
pub mod telegram;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use dispatch::{Dispatcher, DispatchError, Responder, ResponderReply};
pub use error::WebhookError;
pub use ratelimit::{FixedWindowRateLimiter, RateDecision};
pub use stats::Stats;
pub use telegram::{parse_update, ValidatedMessage, ValidationError};
pub use web::{build_router, AppState};
