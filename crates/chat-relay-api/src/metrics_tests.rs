use super::*;

#[test]
fn test_separate_instances_do_not_conflict() {
    let first = ServiceMetrics::new();
    let second = ServiceMetrics::new();

    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[test]
fn test_render_includes_recorded_counters() {
    let metrics = ServiceMetrics::new().unwrap();

    metrics.record_http_request("GET", "/ping", 200);
    metrics.record_webhook_update(WebhookOutcome::Message);
    metrics.record_save(true);
    metrics.record_reply(false);

    let text = metrics.render().unwrap();

    assert!(text.contains("http_requests_total{method=\"GET\",path=\"/ping\",status=\"200\"} 1"));
    assert!(text.contains("webhook_updates_total{outcome=\"message\"} 1"));
    assert!(text.contains("messages_saved_total 1"));
    assert!(text.contains("reply_failures_total 1"));
}

#[test]
fn test_refresh_event_log_sets_gauges() {
    let metrics = ServiceMetrics::new().unwrap();

    metrics.refresh_event_log(&EventLogStats {
        accepted: 10,
        dropped: 2,
        written: 9,
        write_failures: 1,
    });

    assert_eq!(metrics.event_log_accepted.get(), 10);
    assert_eq!(metrics.event_log_dropped.get(), 2);
    assert_eq!(metrics.event_log_written.get(), 9);
    assert_eq!(metrics.event_log_write_failures.get(), 1);
}

#[test]
fn test_gauge_saturates_on_overflow() {
    let metrics = ServiceMetrics::new().unwrap();

    metrics.refresh_event_log(&EventLogStats {
        accepted: u64::MAX,
        ..Default::default()
    });

    assert_eq!(metrics.event_log_accepted.get(), i64::MAX);
}

#[test]
fn test_webhook_outcome_labels() {
    assert_eq!(WebhookOutcome::Message.as_str(), "message");
    assert_eq!(WebhookOutcome::Ignored.as_str(), "ignored");
    assert_eq!(WebhookOutcome::Invalid.as_str(), "invalid");
}
