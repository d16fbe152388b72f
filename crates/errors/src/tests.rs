use super::*;

#[test]
fn test_task_not_found_display() {
    let err = SchedulerError::task_not_found(42);
    assert_eq!(err.to_string(), "任务未找到: 42");
}

#[test]
fn test_fatal_classification() {
    assert!(SchedulerError::config_error("bad toml").is_fatal());
    assert!(SchedulerError::Internal("boom".to_string()).is_fatal());
    assert!(!SchedulerError::QueueClosed.is_fatal());
    assert!(!SchedulerError::task_not_found(1).is_fatal());
}

#[test]
fn test_retryable_classification() {
    assert!(SchedulerError::log_store_error("upload failed").is_retryable());
    assert!(SchedulerError::Network("connection refused".to_string()).is_retryable());
    assert!(SchedulerError::CommandSpawn("no such file".to_string()).is_retryable());
    assert!(!SchedulerError::config_error("bad").is_retryable());
    assert!(!SchedulerError::task_not_found(1).is_retryable());
}

#[test]
fn test_from_serde_json() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: SchedulerError = parse_err.into();
    assert!(matches!(err, SchedulerError::Serialization(_)));
}

#[test]
fn test_from_anyhow() {
    let err: SchedulerError = anyhow::anyhow!("wiring failed").into();
    assert!(matches!(err, SchedulerError::Internal(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_helper_constructors() {
    assert!(matches!(
        SchedulerError::database_error("lost connection"),
        SchedulerError::DatabaseOperation(_)
    ));
    assert!(matches!(
        SchedulerError::validation_error("empty name"),
        SchedulerError::ValidationError(_)
    ));
}
