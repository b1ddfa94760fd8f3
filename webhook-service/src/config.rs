//! Configuration module for environment variable parsing.
//!
//! All settings come from environment variables. Parsing never fails on its
//! own; malformed numbers fall back to defaults with a warning, and
//! [`Config::validate`] decides whether the result is usable.

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use axum::http::HeaderName;
use thiserror::Error;
use tracing::warn;
use url::{Host, Url};

/// Header Telegram uses for the webhook secret.
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Configuration errors that abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address for the web server to bind to
    pub host: String,

    /// Port for the web server to listen on
    pub port: u16,

    /// Shared secret used to sign webhook bodies (HMAC-SHA256)
    pub webhook_secret: String,

    /// Header carrying the body signature
    pub signature_header: String,

    /// Maximum accepted requests per source within one window
    pub rate_limit: u32,

    /// Length of a rate limit window in seconds
    pub rate_limit_window_secs: u64,

    /// Upper bound on the number of sources tracked by the rate limiter
    pub rate_limit_max_sources: usize,

    /// Use X-Forwarded-For / X-Real-IP as the request source
    pub trust_forwarded_headers: bool,

    /// Responder timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_request_size: usize,

    /// Remote AI agent endpoint. The simulated agent is used when unset.
    pub responder_url: Option<String>,

    /// Bearer token sent to the remote AI agent
    pub responder_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Config {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: parse_or("PORT", &lookup, 8000),

            webhook_secret: lookup("WEBHOOK_SECRET_TOKEN").unwrap_or_default(),

            signature_header: non_empty(lookup("SIGNATURE_HEADER"))
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string()),

            rate_limit: parse_or("RATE_LIMIT", &lookup, 100),

            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", &lookup, 60),

            rate_limit_max_sources: parse_or("RATE_LIMIT_MAX_SOURCES", &lookup, 10_000),

            trust_forwarded_headers: lookup("TRUST_FORWARDED_HEADERS")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),

            request_timeout_secs: parse_or("REQUEST_TIMEOUT", &lookup, 30),

            max_request_size: parse_or("MAX_REQUEST_SIZE", &lookup, 1024 * 1024), // 1MB

            responder_url: non_empty(lookup("AI_AGENT_URL")),

            responder_api_key: non_empty(lookup("AI_AGENT_API_KEY")),
        }
    }

    /// Check the loaded values, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.webhook_secret.trim().is_empty() {
            errors.push("WEBHOOK_SECRET_TOKEN is required".to_string());
        }

        if !is_bindable_host(&self.host) {
            errors.push(format!(
                "HOST must be an IP address or hostname, got {:?}",
                self.host
            ));
        }

        if self.port == 0 {
            errors.push("PORT must be between 1 and 65535".to_string());
        }

        if HeaderName::from_bytes(self.signature_header.as_bytes()).is_err() {
            errors.push(format!(
                "SIGNATURE_HEADER is not a valid header name: {:?}",
                self.signature_header
            ));
        }

        if self.rate_limit == 0 {
            errors.push("RATE_LIMIT must be greater than 0".to_string());
        }

        if self.rate_limit_window_secs == 0 {
            errors.push("RATE_LIMIT_WINDOW must be greater than 0".to_string());
        }

        if self.request_timeout_secs == 0 {
            errors.push("REQUEST_TIMEOUT must be greater than 0".to_string());
        }

        if let Some(raw) = &self.responder_url {
            if let Err(e) = Url::parse(raw) {
                errors.push(format!("AI_AGENT_URL is not a valid URL: {}", e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Parse a variable, falling back to the default when absent or malformed.
fn parse_or<T, F>(name: &str, lookup: &F, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
    }
}

/// Bare IPv4/IPv6 literals or DNS names; `host:port` forms are rejected.
fn is_bindable_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    !host.contains(':') && matches!(Host::parse(host), Ok(Host::Domain(_)))
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.signature_header, DEFAULT_SIGNATURE_HEADER);
        assert_eq!(config.rate_limit, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_request_size, 1024 * 1024);
        assert!(!config.trust_forwarded_headers);
        assert!(config.responder_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("WEBHOOK_SECRET_TOKEN", "s3cret"),
            ("RATE_LIMIT", "5"),
            ("RATE_LIMIT_WINDOW", "10"),
            ("TRUST_FORWARDED_HEADERS", "true"),
            ("AI_AGENT_URL", "http://agent.local/respond"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.webhook_secret, "s3cret");
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.rate_limit_window_secs, 10);
        assert!(config.trust_forwarded_headers);
        assert_eq!(
            config.responder_url.as_deref(),
            Some("http://agent.local/respond")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_number_uses_default() {
        let config = config_from(&[("RATE_LIMIT", "lots")]);
        assert_eq!(config.rate_limit, 100);
    }

    #[test]
    fn test_blank_optional_values_are_unset() {
        let config = config_from(&[("AI_AGENT_URL", "  "), ("SIGNATURE_HEADER", "")]);
        assert!(config.responder_url.is_none());
        assert_eq!(config.signature_header, DEFAULT_SIGNATURE_HEADER);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = config_from(&[
            ("PORT", "0"),
            ("RATE_LIMIT", "0"),
            ("AI_AGENT_URL", "not a url"),
        ]);

        let ConfigError::Invalid(errors) = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("WEBHOOK_SECRET_TOKEN")));
        assert!(errors.iter().any(|e| e.contains("PORT")));
        assert!(errors.iter().any(|e| e.contains("RATE_LIMIT ")));
        assert!(errors.iter().any(|e| e.contains("AI_AGENT_URL")));
    }

    #[test]
    fn test_validate_accepts_host_forms() {
        for host in ["0.0.0.0", "127.0.0.1", "::", "::1", "localhost", "webhook.internal"] {
            let config = config_from(&[("HOST", host), ("WEBHOOK_SECRET_TOKEN", "s3cret")]);
            assert!(config.validate().is_ok(), "host {} should be accepted", host);
        }
    }

    #[test]
    fn test_validate_rejects_bad_host() {
        for host in ["bad host", "", "127.0.0.1:8000"] {
            let config = config_from(&[("HOST", host), ("WEBHOOK_SECRET_TOKEN", "s3cret")]);
            let ConfigError::Invalid(errors) = config.validate().unwrap_err();
            assert_eq!(errors.len(), 1, "host {:?}", host);
            assert!(errors[0].contains("HOST"));
        }
    }

    #[test]
    fn test_validate_rejects_bad_signature_header() {
        let config = config_from(&[
            ("SIGNATURE_HEADER", "X Sig"),
            ("WEBHOOK_SECRET_TOKEN", "s3cret"),
        ]);

        let ConfigError::Invalid(errors) = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("SIGNATURE_HEADER"));
    }

    #[test]
    fn test_custom_signature_header_is_valid() {
        let config = config_from(&[
            ("SIGNATURE_HEADER", "X-Hub-Signature-256"),
            ("WEBHOOK_SECRET_TOKEN", "s3cret"),
        ]);
        assert!(config.validate().is_ok());
    }
}
