//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chat_relay_core::{EventLogError, StoreError};
use tracing::{error, warn};

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: the request body is malformed or fails validation;
///   the client should not retry
/// - `503 Service Unavailable`: a dependency is temporarily down; the client
///   may retry after the `Retry-After` delay
/// - `500 Internal Server Error`: unexpected server failure
///
/// The reason behind a `400` is logged server-side; clients only see the
/// fixed message.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Body of a `/message` request is not a valid message
    #[error("Invalid request")]
    InvalidRequest { reason: String },

    /// Body of a `/webhook` request is not a Telegram update
    #[error("Error while decoding")]
    UndecodableUpdate { reason: String },

    /// Message store cannot serve the request
    #[error("Message store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Unexpected internal server error
    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            Self::InvalidRequest { ref reason } => {
                warn!(reason = %reason, "Rejected invalid message request");
                (StatusCode::BAD_REQUEST, self.to_string(), None)
            }
            Self::UndecodableUpdate { ref reason } => {
                warn!(reason = %reason, "Rejected undecodable webhook update");
                (StatusCode::BAD_REQUEST, self.to_string(), None)
            }
            Self::StoreUnavailable(ref e) => {
                warn!(error = %e, "Message store unavailable");
                let retry_after = if e.is_transient() { Some(30) } else { None };
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), retry_after)
            }
            Self::InternalError { ref message } => {
                // Log detailed error server-side but return generic message to client
                error!(error = %message, "Internal server error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error occurred. Please try again later.".to_string(),
                    None,
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    #[error("Message store error: {0}")]
    Store(#[from] StoreError),

    #[error("Metrics initialization failed: {message}")]
    Metrics { message: String },
}

impl ServiceError {
    /// Process exit code reported by the service binary
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) | Self::Store(_) | Self::Metrics { .. } => 3,
            Self::EventLog(_) => 4,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid value '{value}' in environment variable {key}")]
    InvalidLegacyValue { key: String, value: String },
}
