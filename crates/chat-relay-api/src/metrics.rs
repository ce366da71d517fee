//! Metrics collection for the API service.
//!
//! Every [`ServiceMetrics`] owns its own Prometheus registry, so several
//! routers (for example in tests) can coexist in one process.

use chat_relay_core::EventLogStats;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,

    // Relay metrics
    pub webhook_updates_total: IntCounterVec,
    pub messages_saved_total: IntCounter,
    pub message_save_failures_total: IntCounter,
    pub replies_sent_total: IntCounter,
    pub reply_failures_total: IntCounter,

    // Event log gauges, refreshed on scrape
    pub event_log_accepted: IntGauge,
    pub event_log_dropped: IntGauge,
    pub event_log_written: IntGauge,
    pub event_log_write_failures: IntGauge,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let webhook_updates_total = IntCounterVec::new(
            Opts::new("webhook_updates_total", "Webhook updates by outcome"),
            &["outcome"],
        )?;
        let messages_saved_total =
            IntCounter::new("messages_saved_total", "Messages persisted to the store")?;
        let message_save_failures_total = IntCounter::new(
            "message_save_failures_total",
            "Messages the store failed to persist",
        )?;
        let replies_sent_total = IntCounter::new("replies_sent_total", "Replies delivered")?;
        let reply_failures_total =
            IntCounter::new("reply_failures_total", "Replies that could not be delivered")?;

        let event_log_accepted =
            IntGauge::new("event_log_accepted", "Events accepted into the event log queue")?;
        let event_log_dropped =
            IntGauge::new("event_log_dropped", "Events dropped by the event log")?;
        let event_log_written =
            IntGauge::new("event_log_written", "Events written to the log destination")?;
        let event_log_write_failures = IntGauge::new(
            "event_log_write_failures",
            "Accepted events lost to destination write failures",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(webhook_updates_total.clone()))?;
        registry.register(Box::new(messages_saved_total.clone()))?;
        registry.register(Box::new(message_save_failures_total.clone()))?;
        registry.register(Box::new(replies_sent_total.clone()))?;
        registry.register(Box::new(reply_failures_total.clone()))?;
        registry.register(Box::new(event_log_accepted.clone()))?;
        registry.register(Box::new(event_log_dropped.clone()))?;
        registry.register(Box::new(event_log_written.clone()))?;
        registry.register(Box::new(event_log_write_failures.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            webhook_updates_total,
            messages_saved_total,
            message_save_failures_total,
            replies_sent_total,
            reply_failures_total,
            event_log_accepted,
            event_log_dropped,
            event_log_written,
            event_log_write_failures,
        }))
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
    }

    pub fn record_webhook_update(&self, outcome: WebhookOutcome) {
        self.webhook_updates_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_save(&self, success: bool) {
        if success {
            self.messages_saved_total.inc();
        } else {
            self.message_save_failures_total.inc();
        }
    }

    pub fn record_reply(&self, success: bool) {
        if success {
            self.replies_sent_total.inc();
        } else {
            self.reply_failures_total.inc();
        }
    }

    /// Copy event log counters into the gauges
    pub fn refresh_event_log(&self, stats: &EventLogStats) {
        self.event_log_accepted.set(saturating_i64(stats.accepted));
        self.event_log_dropped.set(saturating_i64(stats.dropped));
        self.event_log_written.set(saturating_i64(stats.written));
        self.event_log_write_failures
            .set(saturating_i64(stats.write_failures));
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

/// How a webhook update was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Text message recorded, saved and answered
    Message,
    /// Update carried nothing to answer
    Ignored,
    /// Body could not be decoded
    Invalid,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Ignored => "ignored",
            Self::Invalid => "invalid",
        }
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
