//! Response dispatch to the AI agent.
//!
//! The agent is an injected [`Responder`]. Two implementations ship with the
//! service:
//! - [`SimulatedResponder`]: in-process keyword responder (default)
//! - [`HttpResponder`]: forwards to a remote agent over HTTP
//!
//! ## Flow
//!
//! ```text
//! ValidatedMessage → Dispatcher (timeout) → Responder → ResponderReply
//! ```

pub mod http;
pub mod simulated;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::telegram::ValidatedMessage;

pub use http::HttpResponder;
pub use simulated::SimulatedResponder;

/// Request sent to the AI agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRequest {
    /// Sequence number assigned by the dispatcher
    pub webhook_id: u64,
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub message_text: Option<String>,
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
}

impl AiRequest {
    pub fn from_message(webhook_id: u64, message: &ValidatedMessage) -> Self {
        Self {
            webhook_id,
            update_id: message.update_id(),
            chat_id: message.chat_id(),
            user_id: message.sender_id(),
            message_text: message.text().map(str::to_string),
            message_type: message.message_type().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Successful reply from the AI agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponderReply {
    pub response_text: Option<String>,
    /// Time the agent spent, in seconds
    pub processing_time: f64,
}

/// Why a dispatch failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("responder timed out after {0:?}")]
    Timeout(Duration),

    #[error("responder unreachable: {0}")]
    Unavailable(String),

    #[error("responder failed: {0}")]
    Failed(String),
}

/// Agent health as reported on `/health` and `/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponderHealth {
    pub status: &'static str,
    pub kind: &'static str,
    pub is_ready: bool,
    pub processing_count: u64,
    /// Mean time per completed request, in seconds
    pub average_processing_time: f64,
    pub timestamp: DateTime<Utc>,
}

/// Request counters shared by the responder implementations.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    started: AtomicU64,
    completed: AtomicU64,
    total_micros: AtomicU64,
}

impl ProcessingStats {
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processing_count(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn average_processing_time(&self) -> f64 {
        let completed = self.completed.load(Ordering::Relaxed);
        if completed == 0 {
            return 0.0;
        }
        self.total_micros.load(Ordering::Relaxed) as f64 / completed as f64 / 1_000_000.0
    }

    pub fn health(&self, kind: &'static str, is_ready: bool) -> ResponderHealth {
        ResponderHealth {
            status: if is_ready { "healthy" } else { "unhealthy" },
            kind,
            is_ready,
            processing_count: self.processing_count(),
            average_processing_time: self.average_processing_time(),
            timestamp: Utc::now(),
        }
    }
}

/// The AI agent capability.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for one message.
    async fn respond(&self, request: &AiRequest) -> Result<ResponderReply, DispatchError>;

    /// Report health without side effects.
    fn health(&self) -> ResponderHealth;
}

/// Forwards validated messages to the responder under a timeout.
#[derive(Clone)]
pub struct Dispatcher {
    responder: Arc<dyn Responder>,
    timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(responder: Arc<dyn Responder>, timeout: Duration) -> Self {
        Self {
            responder,
            timeout,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn responder_health(&self) -> ResponderHealth {
        self.responder.health()
    }

    /// Send a message to the responder and wait for its reply.
    pub async fn dispatch(
        &self,
        message: &ValidatedMessage,
    ) -> Result<ResponderReply, DispatchError> {
        let webhook_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = AiRequest::from_message(webhook_id, message);

        info!(
            webhook_id = webhook_id,
            update_id = request.update_id,
            message_type = %request.message_type,
            "dispatch_start"
        );

        let response = self.responder.respond(&request);
        let result = match tokio::time::timeout(self.timeout, response).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        };

        match &result {
            Ok(reply) => info!(
                webhook_id = webhook_id,
                processing_time = reply.processing_time,
                has_response = reply.response_text.is_some(),
                "dispatch_complete"
            ),
            Err(e) => error!(webhook_id = webhook_id, error = %e, "dispatch_failed"),
        }

        result
    }
}
