//! Remote AI agent over HTTP.
//!
//! POSTs the [`AiRequest`] as JSON and expects `{"response_text": ...}` back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use super::{
    AiRequest, DispatchError, ProcessingStats, Responder, ResponderHealth, ResponderReply,
};

#[derive(Debug, Deserialize)]
struct AgentResponse {
    #[serde(default)]
    response_text: Option<String>,
}

/// Responder that forwards requests to a remote agent endpoint.
pub struct HttpResponder {
    client: Client,
    url: String,
    api_key: Option<String>,
    stats: ProcessingStats,
    /// Cleared when the last call could not reach the agent
    reachable: AtomicBool,
}

impl HttpResponder {
    pub fn new(url: String, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(16)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            api_key,
            stats: ProcessingStats::default(),
            reachable: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn respond(&self, request: &AiRequest) -> Result<ResponderReply, DispatchError> {
        let started = Instant::now();
        self.stats.record_started();

        let mut call = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let resp = call.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                error!(url = %self.url, error = %e, "http_agent_unreachable");
                self.reachable.store(false, Ordering::Relaxed);
                DispatchError::Unavailable(e.to_string())
            } else {
                error!(url = %self.url, error = %e, "http_agent_request_error");
                DispatchError::Failed(e.to_string())
            }
        })?;

        self.reachable.store(true, Ordering::Relaxed);

        let status = resp.status();
        if !status.is_success() {
            error!(url = %self.url, status_code = status.as_u16(), "http_agent_error_status");
            return Err(DispatchError::Failed(format!(
                "agent returned status {}",
                status.as_u16()
            )));
        }

        let body: AgentResponse = resp.json().await.map_err(|e| {
            error!(url = %self.url, error = %e, "http_agent_invalid_body");
            DispatchError::Failed(format!("invalid agent response: {}", e))
        })?;

        let elapsed = started.elapsed();
        self.stats.record_completed(elapsed);
        let processing_time = elapsed.as_secs_f64();

        info!(
            webhook_id = request.webhook_id,
            status_code = status.as_u16(),
            processing_time = processing_time,
            "http_agent_complete"
        );

        Ok(ResponderReply {
            response_text: body.response_text,
            processing_time,
        })
    }

    fn health(&self) -> ResponderHealth {
        self.stats.health("http", self.reachable.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> AiRequest {
        AiRequest {
            webhook_id: 3,
            update_id: 11,
            chat_id: 42,
            user_id: Some(7),
            message_text: Some("hello".to_string()),
            message_type: "text".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_respond_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/respond"))
            .and(header("authorization", "Bearer agent-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "response_text": "hi back" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let responder = HttpResponder::new(
            format!("{}/respond", server.uri()),
            Some("agent-key".to_string()),
        )
        .unwrap();

        let reply = responder.respond(&request()).await.unwrap();
        assert_eq!(reply.response_text.as_deref(), Some("hi back"));
        let health = responder.health();
        assert_eq!(health.processing_count, 1);
        assert!(health.is_ready);
        assert!(health.average_processing_time > 0.0);
    }

    #[tokio::test]
    async fn test_respond_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let responder = HttpResponder::new(server.uri(), None).unwrap();

        let err = responder.respond(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Failed(_)));
    }

    #[tokio::test]
    async fn test_respond_unreachable() {
        // Bind then release a port so nothing is listening on it
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let responder = HttpResponder::new(format!("http://{}/respond", addr), None).unwrap();
        assert!(responder.health().is_ready);

        let err = responder.respond(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unavailable(_)));
        assert!(!responder.health().is_ready);
        assert_eq!(responder.health().status, "unhealthy");
    }
}
