//! Simulated AI agent.
//!
//! Replies from a small keyword table after a fixed processing delay.
//! Russian keywords get Russian replies, English keywords English ones.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use tracing::info;

use super::{
    AiRequest, DispatchError, ProcessingStats, Responder, ResponderHealth, ResponderReply,
};

/// Default simulated processing delay.
const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// In-process responder that fakes an AI agent.
pub struct SimulatedResponder {
    delay: Duration,
    stats: ProcessingStats,
}

impl SimulatedResponder {
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            stats: ProcessingStats::default(),
        }
    }

    pub fn processing_count(&self) -> u64 {
        self.stats.processing_count()
    }
}

impl Default for SimulatedResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Responder for SimulatedResponder {
    async fn respond(&self, request: &AiRequest) -> Result<ResponderReply, DispatchError> {
        let started = Instant::now();
        self.stats.record_started();

        info!(webhook_id = request.webhook_id, "simulated_agent_processing");

        tokio::time::sleep(self.delay).await;

        let response_text = generate_reply(request.message_text.as_deref());
        let elapsed = started.elapsed();
        self.stats.record_completed(elapsed);
        let processing_time = elapsed.as_secs_f64();

        info!(
            webhook_id = request.webhook_id,
            processing_time = processing_time,
            "simulated_agent_complete"
        );

        Ok(ResponderReply {
            response_text: Some(response_text),
            processing_time,
        })
    }

    fn health(&self) -> ResponderHealth {
        self.stats.health("simulated", true)
    }
}

/// Pick a canned reply for the message text.
pub fn generate_reply(text: Option<&str>) -> String {
    let Some(original) = text.filter(|t| !t.trim().is_empty()) else {
        return "Received a message without text".to_string();
    };

    let text = original.trim().to_lowercase();
    let now = || Local::now().format("%H:%M:%S");

    if text.contains("привет") {
        "Привет! Рад вас видеть!".to_string()
    } else if text.contains("hello") {
        "Hello! Nice to see you!".to_string()
    } else if text.contains("помощь") {
        "Я могу помочь вам с различными вопросами. Что вам нужно?".to_string()
    } else if text.contains("help") {
        "I can help you with all sorts of questions. What do you need?".to_string()
    } else if text.contains("время") {
        format!("Текущее время: {}", now())
    } else if text.contains("time") {
        format!("Current time: {}", now())
    } else if text.contains('?') {
        "Interesting question! Let me think about it.".to_string()
    } else {
        format!("Received message: '{}'", original)
    }
}
