//! Tests for HTTP error mapping and exit codes.

use super::*;
use axum::body::to_bytes;

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_invalid_request_maps_to_400_with_fixed_message() {
    let error = HandlerError::InvalidRequest {
        reason: "missing field `username`".to_string(),
    };

    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("Retry-After").is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid request");
    assert_eq!(body["status"], 400);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_undecodable_update_maps_to_400() {
    let error = HandlerError::UndecodableUpdate {
        reason: "expected value at line 1 column 1".to_string(),
    };

    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Error while decoding");
}

#[tokio::test]
async fn test_transient_store_failure_maps_to_503_with_retry_after() {
    let error = HandlerError::StoreUnavailable(StoreError::Unavailable {
        message: "disk offline".to_string(),
    });

    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers().get("Retry-After").unwrap(), "30");
}

#[tokio::test]
async fn test_permanent_store_failure_has_no_retry_after() {
    let error = HandlerError::StoreUnavailable(StoreError::Corrupted {
        path: "messages.jsonl".to_string(),
        line: 1,
        message: "bad".to_string(),
    });

    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get("Retry-After").is_none());
}

#[tokio::test]
async fn test_internal_error_hides_details() {
    let error = HandlerError::InternalError {
        message: "secret detail".to_string(),
    };

    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(!body["error"].as_str().unwrap().contains("secret detail"));
}

#[test]
fn test_service_error_exit_codes() {
    assert_eq!(
        ServiceError::BindFailed {
            address: "0.0.0.0:80".to_string(),
            message: "denied".to_string()
        }
        .exit_code(),
        1
    );
    assert_eq!(
        ServiceError::ServerFailed {
            message: "boom".to_string()
        }
        .exit_code(),
        2
    );
    assert_eq!(
        ServiceError::Configuration(ConfigError::Missing {
            key: "storage.path".to_string()
        })
        .exit_code(),
        3
    );
    assert_eq!(
        ServiceError::EventLog(EventLogError::InvalidConfiguration {
            message: "zero".to_string()
        })
        .exit_code(),
        4
    );
}
