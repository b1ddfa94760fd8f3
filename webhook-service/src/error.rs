//! Webhook error taxonomy and its HTTP mapping.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::stats::Rejection;
use crate::telegram::ValidationError;

/// Everything that can end a webhook request early.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("empty request body")]
    EmptyBody,

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::EmptyBody => StatusCode::BAD_REQUEST,
            WebhookError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WebhookError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            WebhookError::Dispatch(DispatchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            WebhookError::Dispatch(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short machine-readable status string.
    pub fn status(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => "unauthorized",
            WebhookError::EmptyBody => "bad_request",
            WebhookError::Validation(_) => "validation_failed",
            WebhookError::RateLimited { .. } => "rate_limited",
            WebhookError::Dispatch(DispatchError::Timeout(_)) => "responder_timeout",
            WebhookError::Dispatch(_) => "responder_failed",
        }
    }

    /// How this error counts in the stats, `None` for dispatch errors.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                Some(Rejection::Auth)
            }
            WebhookError::EmptyBody => Some(Rejection::BadRequest),
            WebhookError::Validation(_) => Some(Rejection::Validation),
            WebhookError::RateLimited { .. } => Some(Rejection::RateLimited),
            WebhookError::Dispatch(_) => None,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            status: self.status(),
            message: self.to_string(),
            field: match &self {
                WebhookError::Validation(e) => Some(e.field.clone()),
                _ => None,
            },
        };

        let mut response = (self.status_code(), Json(body)).into_response();

        if let WebhookError::RateLimited { retry_after } = self {
            // Round up so clients never retry inside the window
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
