//! Runtime configuration
//!
//! Settings come from the process environment, optionally seeded from a `.env`
//! file. Every setting has a demo default, so an empty environment runs the
//! engine against the in-memory backend.

use crate::core::idempotency::GuardPolicy;
use crate::core::lifecycle::{LifecycleConfig, DEFAULT_PROGRAM_FUNDING_SOURCE};
use crate::ingest::signature::{WebhookVerifier, DEFAULT_TOLERANCE_SECS};
use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Consumer that refunds are attributed to when a command or event names none
pub const DEFAULT_DEMO_USER_ID: &str = "demo-user";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub program_funding_source: String,
    pub demo_user_id: String,
    pub processor_webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    pub idempotency_wait_ms: u64,
    pub idempotency_poll_ms: u64,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = GuardPolicy::default();

        Ok(AppConfig {
            program_funding_source: lookup("PROGRAM_FUNDING_SOURCE")
                .unwrap_or_else(|| DEFAULT_PROGRAM_FUNDING_SOURCE.to_string()),
            demo_user_id: lookup("DEMO_USER_ID").unwrap_or_else(|| DEFAULT_DEMO_USER_ID.to_string()),
            processor_webhook_secret: lookup("PROCESSOR_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            webhook_tolerance_secs: lookup("WEBHOOK_TOLERANCE_SECS")
                .unwrap_or_else(|| DEFAULT_TOLERANCE_SECS.to_string())
                .parse()
                .context("WEBHOOK_TOLERANCE_SECS must be a whole number of seconds")?,
            idempotency_wait_ms: lookup("IDEMPOTENCY_WAIT_MS")
                .unwrap_or_else(|| defaults.in_progress_wait.as_millis().to_string())
                .parse()
                .context("IDEMPOTENCY_WAIT_MS must be a whole number of milliseconds")?,
            idempotency_poll_ms: lookup("IDEMPOTENCY_POLL_MS")
                .unwrap_or_else(|| defaults.poll_interval.as_millis().to_string())
                .parse()
                .context("IDEMPOTENCY_POLL_MS must be a whole number of milliseconds")?,
            log_format: parse_log_format(lookup("LOG_FORMAT").as_deref())?,
        })
    }

    pub fn guard_policy(&self) -> GuardPolicy {
        GuardPolicy {
            in_progress_wait: Duration::from_millis(self.idempotency_wait_ms),
            poll_interval: Duration::from_millis(self.idempotency_poll_ms.max(1)),
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            program_funding_source: self.program_funding_source.clone(),
            guard_policy: self.guard_policy(),
        }
    }

    /// Verifier for processor webhooks, if a secret is configured
    pub fn webhook_verifier(&self) -> Option<WebhookVerifier> {
        self.processor_webhook_secret
            .as_ref()
            .map(|secret| WebhookVerifier::new(secret.as_bytes(), self.webhook_tolerance_secs))
    }
}

fn parse_log_format(raw: Option<&str>) -> anyhow::Result<LogFormat> {
    match raw.map(|value| value.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("text") => Ok(LogFormat::Text),
        Some("json") => Ok(LogFormat::Json),
        Some(other) => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
    }
}
