//! # Chat Relay HTTP Service
//!
//! HTTP server receiving chat messages and Telegram webhook updates.
//!
//! This service provides:
//! - `POST /message` and `POST /webhook` for inbound messages
//! - `GET /messages` listing persisted messages
//! - `GET /ping`, `GET /health` and `GET /metrics` for monitoring
//!
//! Every handler reports what it does through an
//! [`EventRecorder`](chat_relay_core::EventRecorder); operational diagnostics
//! go through `tracing`.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;
pub mod telegram;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig, StorageConfig, TelegramConfig};
pub use errors::{ConfigError, HandlerError, ServiceError};
pub use metrics::{ServiceMetrics, WebhookOutcome};
pub use responses::*;
pub use telegram::{TelegramSender, Update};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, State},
    http::StatusCode,
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use chat_relay_core::{
    received_event, reply_text, ChatId, ChatMessage, EventLog, EventRecorder, MessageSender,
    MessageStore, ServiceState, Timestamp,
};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Destination for relay events
    pub recorder: Arc<dyn EventRecorder>,

    /// Event log behind `recorder`, when there is one, for health reporting
    pub event_log: Option<Arc<EventLog>>,

    /// Persistence for received messages
    pub store: Arc<dyn MessageStore>,

    /// Outbound replies
    pub sender: Arc<dyn MessageSender>,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        recorder: Arc<dyn EventRecorder>,
        store: Arc<dyn MessageStore>,
        sender: Arc<dyn MessageSender>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config,
            recorder,
            event_log: None,
            store,
            sender,
            metrics,
        }
    }

    /// Record events into `event_log` and report its statistics
    pub fn with_event_log(mut self, event_log: Arc<EventLog>) -> Self {
        self.recorder = Arc::clone(&event_log) as Arc<dyn EventRecorder>;
        self.event_log = Some(event_log);
        self
    }

    fn record(&self, event: String) {
        self.recorder.record_event(event);
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let relay_routes = Router::new()
        .route("/message", post(handle_message))
        .route("/webhook", post(handle_webhook))
        .route("/messages", get(list_messages));

    let observability_routes = Router::new()
        .route("/ping", get(handle_ping))
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(relay_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(state.config.server.max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Bind to the configured address and serve until `shutdown` completes
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = state.config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` completes
///
/// After the shutdown signal, in-flight requests get
/// `server.shutdown_timeout_seconds` to finish before the server stops
/// waiting for them.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| state.config.server.bind_address());
    let drain_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);
    let recorder = Arc::clone(&state.recorder);

    info!(address = %address, "Starting HTTP server");
    recorder.record_event(format!("Starting server on {}", address));

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    };

    let server = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .into_future();

    let drain_deadline = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(drain_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                recorder.record_event(format!("Error while running server: {}", e));
                return Err(ServiceError::ServerFailed {
                    message: e.to_string(),
                });
            }
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = drain_timeout.as_secs(),
                "In-flight requests did not finish before the shutdown timeout"
            );
            recorder.record_event(
                "Error while shutting down server: in-flight requests timed out".to_string(),
            );
        }
    }

    recorder.record_event("Server is down!".to_string());
    info!("HTTP server shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM and record which one arrived
pub async fn shutdown_signal(recorder: Arc<dyn EventRecorder>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "interrupt",
        _ = terminate => "terminated",
    };

    info!(signal = signal, "Received shutdown signal, initiating graceful shutdown");
    recorder.record_event(format!("Received signal: {}", signal));
}

// ============================================================================
// Relay Handlers
// ============================================================================

/// Liveness probe
#[instrument(skip(state))]
async fn handle_ping(State(state): State<AppState>) -> Json<PingResponse> {
    state.record("Ping request received".to_string());

    Json(PingResponse {
        message: "pong".to_string(),
    })
}

/// Accept a `{username, text}` message and persist it
#[instrument(skip(state, body))]
pub async fn handle_message(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageAcceptedResponse>, HandlerError> {
    let request: MessageRequest =
        serde_json::from_slice(&body).map_err(|e| HandlerError::InvalidRequest {
            reason: e.to_string(),
        })?;

    let message = ChatMessage::new(request.username, request.text).map_err(|e| {
        HandlerError::InvalidRequest {
            reason: e.to_string(),
        }
    })?;

    state.record(received_event(&message));
    save_message(&state, &message).await;

    Ok(Json(MessageAcceptedResponse {
        status: "received".to_string(),
    }))
}

/// Handle a Telegram webhook update
///
/// Text messages are recorded, persisted and answered. Anything else that
/// decodes is acknowledged without a reply. Storage and delivery failures are
/// recorded but never change the response.
#[instrument(skip(state, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, HandlerError> {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            state.record(format!("Error while decoding webhook update: {}", e));
            state.metrics.record_webhook_update(WebhookOutcome::Invalid);
            return Err(HandlerError::UndecodableUpdate {
                reason: e.to_string(),
            });
        }
    };

    let Some(incoming) = update.message else {
        state.record(format!("Update {} has no message, ignoring", update.update_id));
        state.metrics.record_webhook_update(WebhookOutcome::Ignored);
        return Ok(StatusCode::OK);
    };

    let Some(text) = incoming.text.clone() else {
        state.record(format!(
            "Update {} has no text message, ignoring",
            update.update_id
        ));
        state.metrics.record_webhook_update(WebhookOutcome::Ignored);
        return Ok(StatusCode::OK);
    };

    let message = match ChatMessage::new(incoming.sender_name(), text) {
        Ok(message) => message,
        Err(e) => {
            state.record(format!(
                "Update {} has an invalid sender, ignoring: {}",
                update.update_id, e
            ));
            state.metrics.record_webhook_update(WebhookOutcome::Ignored);
            return Ok(StatusCode::OK);
        }
    };

    state.record(received_event(&message));
    state.metrics.record_webhook_update(WebhookOutcome::Message);
    save_message(&state, &message).await;

    let chat_id = ChatId::new(incoming.chat.id);
    match state
        .sender
        .send_message(chat_id, &reply_text(&message))
        .await
    {
        Ok(()) => {
            state.metrics.record_reply(true);
            debug!(chat_id = %chat_id, "Reply sent");
        }
        Err(e) => {
            state.metrics.record_reply(false);
            warn!(chat_id = %chat_id, error = %e, "Failed to send reply");
        }
    }

    Ok(StatusCode::OK)
}

/// List persisted messages
#[instrument(skip(state))]
async fn list_messages(
    State(state): State<AppState>,
) -> Result<Json<MessageListResponse>, HandlerError> {
    let messages = state.store.list_messages().await?;

    Ok(Json(MessageListResponse {
        total: messages.len(),
        messages,
    }))
}

async fn save_message(state: &AppState, message: &ChatMessage) {
    match state.store.save_message(message).await {
        Ok(stored) => {
            state.metrics.record_save(true);
            debug!(message_id = %stored.id, "Message saved");
            state.record("Message saved successfully".to_string());
        }
        Err(e) => {
            state.metrics.record_save(false);
            warn!(error = %e, "Failed to save message");
            state.record(format!("Error while saving message to database: {}", e));
        }
    }
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Health check covering the message store and the event log
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Message store health check failed");
            false
        }
    };

    let event_log = state.event_log.as_ref().map(|log| EventLogHealth {
        state: log.state(),
        stats: log.stats(),
    });
    let event_log_ok = event_log
        .as_ref()
        .map_or(true, |health| health.state == ServiceState::Running);

    let healthy = store_ok && event_log_ok;
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: Timestamp::now(),
        event_log,
        store: if store_ok { "ok" } else { "unavailable" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    if let Some(event_log) = state.event_log.as_ref() {
        state.metrics.refresh_event_log(&event_log.stats());
    }

    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses the caller's `x-correlation-id` or generates one, and echoes it in
/// the response headers.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    debug!(correlation_id = %correlation_id, "Request started");

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

/// Count requests by method, matched route and status
async fn metrics_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().to_string();
    // Route templates keep label cardinality bounded
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    state
        .metrics
        .record_http_request(&method, &path, response.status().as_u16());

    response
}
