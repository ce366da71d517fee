use super::*;

#[test]
fn test_unavailable_is_transient() {
    let err = StoreError::Unavailable {
        message: "connection refused".to_string(),
    };
    assert!(err.is_transient());
}

#[test]
fn test_corruption_is_permanent() {
    let err = StoreError::Corrupted {
        path: "data/messages.jsonl".to_string(),
        line: 3,
        message: "expected value".to_string(),
    };

    assert!(!err.is_transient());
    assert_eq!(
        err.to_string(),
        "Corrupted record in data/messages.jsonl at line 3: expected value"
    );
}

#[test]
fn test_serialization_failure_is_permanent() {
    let err = StoreError::SerializationFailed {
        message: "bad".to_string(),
    };
    assert!(!err.is_transient());
}
