use super::*;
use chat_relay_core::{ChatMessage, EventLogConfig, LogSink, NullEventRecorder, ServiceState};
use std::path::PathBuf;

fn env_of(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

fn write_config_file(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("service.yaml");
    std::fs::write(&path, contents).expect("Failed to write config file");
    path
}

mod load_config_tests {
    use super::*;

    #[test]
    fn test_defaults_without_any_source() {
        let config = load_config(None, env_of(&[])).expect("Defaults should load");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.event_log.file_name, "server.log");
        assert_eq!(config.event_log.buffer_size, 100);
        assert!(matches!(config.storage, StorageConfig::Filesystem { .. }));
        assert!(config.telegram.bot_token.is_none());
    }

    #[test]
    fn test_explicit_file_is_applied() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_config_file(
            &dir,
            "server:\n  port: 9090\nevent_log:\n  file_name: relay.log\n  buffer_size: 16\nstorage:\n  type: memory\n",
        );

        let config = load_config(path.to_str(), env_of(&[])).expect("File config should load");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.event_log.file_name, "relay.log");
        assert_eq!(config.event_log.buffer_size, 16);
        assert!(matches!(config.storage, StorageConfig::Memory));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let missing = dir.path().join("absent.yaml");

        let result = load_config(missing.to_str(), env_of(&[]));

        assert!(result.is_err());
    }

    #[test]
    fn test_prefixed_environment_overrides_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_config_file(&dir, "server:\n  port: 9090\n");

        let config = load_config(
            path.to_str(),
            env_of(&[
                ("RELAY__SERVER__PORT", "7070"),
                ("RELAY__STORAGE__TYPE", "memory"),
            ]),
        )
        .expect("Environment config should load");

        assert_eq!(config.server.port, 7070);
        assert!(matches!(config.storage, StorageConfig::Memory));
    }

    #[test]
    fn test_legacy_variables_win_over_structured_config() {
        let config = load_config(
            None,
            env_of(&[
                ("RELAY__SERVER__PORT", "7070"),
                ("SERVER_PORT", ":8181"),
                ("LOG_FILE_NAME", "legacy.log"),
                ("BOT_TOKEN", "123:abc"),
            ]),
        )
        .expect("Legacy config should load");

        assert_eq!(config.server.port, 8181);
        assert_eq!(config.event_log.file_name, "legacy.log");
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
    }

    #[test]
    fn test_invalid_legacy_port_fails() {
        let result = load_config(None, env_of(&[("SERVER_PORT", "eighty")]));

        assert!(result.is_err());
    }

    #[test]
    fn test_validation_failure_is_reported() {
        let result = load_config(None, env_of(&[("RELAY__EVENT_LOG__BUFFER_SIZE", "0")]));

        let error = result.expect_err("Zero buffer should be rejected");
        assert!(format!("{:#}", error).contains("buffer_size"));
    }
}

mod build_store_tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_is_reachable() {
        let store = build_store(&StorageConfig::Memory, Arc::new(NullEventRecorder))
            .await
            .expect("Memory store should build");

        assert!(store.ping().await.is_ok());
        assert!(store.list_messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filesystem_store_creates_directory() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("data").join("messages");

        let store = build_store(
            &StorageConfig::Filesystem { path: path.clone() },
            Arc::new(NullEventRecorder),
        )
        .await
        .expect("Filesystem store should build");

        let message = ChatMessage::new("alice", "hello").unwrap();
        store.save_message(&message).await.unwrap();

        assert!(path.is_dir());
        assert_eq!(store.list_messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_filesystem_store_failure_is_returned() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "file").unwrap();

        let result = build_store(
            &StorageConfig::Filesystem {
                path: blocker.join("messages"),
            },
            Arc::new(NullEventRecorder),
        )
        .await;

        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_event_log_drains_pending_events() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let event_log = Arc::new(EventLog::new(EventLogConfig {
            directory: dir.path().join("logs"),
            ..EventLogConfig::default()
        }));
        event_log.start("server.log").unwrap();
        event_log.record_event("Ping request received".to_string());

        close_event_log(Arc::clone(&event_log), Duration::from_secs(5)).await;

        assert_eq!(event_log.state(), ServiceState::Closed);
        let contents = std::fs::read_to_string(dir.path().join("logs").join("server.log")).unwrap();
        assert_eq!(contents, "Ping request received\n");
    }

    /// Writer that takes far longer than the shutdown timeout for every write
    struct SlowWriter;

    impl std::io::Write for SlowWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_secs(3));
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stuck_event_log_does_not_hold_up_runtime_shutdown() {
        let event_log = Arc::new(EventLog::new(EventLogConfig {
            workers: Some(1),
            ..EventLogConfig::default()
        }));
        event_log
            .start_with_sink(LogSink::from_writer(SlowWriter, "slow"))
            .unwrap();
        event_log.record_event("Server is down!".to_string());
        // Let the worker pick the event up and block in the write
        std::thread::sleep(Duration::from_millis(50));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = std::time::Instant::now();

        runtime.block_on(close_event_log(
            Arc::clone(&event_log),
            Duration::from_millis(100),
        ));
        drop(runtime);

        let elapsed = started.elapsed();
        assert!(
            elapsed < Duration::from_secs(1),
            "shutdown took {:?}",
            elapsed
        );
        assert_eq!(event_log.state(), ServiceState::Closed);
    }

    #[test]
    fn test_default_env_filter_uses_level_for_relay_crates() {
        let filter = default_env_filter("debug");

        assert!(filter.contains("chat_relay_service=debug"));
        assert!(filter.contains("chat_relay_api=debug"));
        assert!(filter.contains("chat_relay_core=debug"));
        assert!(filter.contains("tower_http=debug"));
    }
}
