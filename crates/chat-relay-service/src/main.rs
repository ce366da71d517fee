//! # Chat Relay Service
//!
//! Binary entry point for the chat relay HTTP service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging and starts the event log
//! - Builds the message store and the Telegram sender
//! - Serves the HTTP API until SIGINT/SIGTERM, then drains the event log

use anyhow::Context;
use chat_relay_api::{
    shutdown_signal, start_server, AppState, LoggingConfig, ServiceConfig, ServiceError,
    ServiceMetrics, StorageConfig, TelegramSender,
};
use chat_relay_core::adapters::{FilesystemMessageStore, InMemoryMessageStore};
use chat_relay_core::{EventLog, EventRecorder, MessageStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

/// Environment variable naming an explicit configuration file
const CONFIG_FILE_VAR: &str = "RELAY_CONFIG_FILE";

/// Prefix of configuration environment variables, e.g. `RELAY__SERVER__PORT`
const ENV_PREFIX: &str = "RELAY";

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/chat-relay/service.yaml
    //  2. ./config/service.yaml
    //  3. Path given by RELAY_CONFIG_FILE
    //  4. Environment variables prefixed RELAY__ (double-underscore separator)
    //  5. Legacy LOG_FILE_NAME, SERVER_PORT and BOT_TOKEN variables
    // -------------------------------------------------------------------------
    let explicit_path = std::env::var(CONFIG_FILE_VAR)
        .ok()
        .filter(|path| !path.is_empty());

    let service_config = match load_config(explicit_path.as_deref(), None) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = format!("{:#}", e), "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    init_tracing(&service_config.logging);
    info!(
        config_file = explicit_path.as_deref().unwrap_or("<none>"),
        "Starting chat relay service"
    );

    if let Err(e) = run(service_config).await {
        error!(error = %e, "Service stopped with an error");
        std::process::exit(e.exit_code());
    }
}

/// Start every component, serve until a shutdown signal, then drain the log
async fn run(config: ServiceConfig) -> Result<(), ServiceError> {
    let event_log = Arc::new(EventLog::new(config.event_log.clone()));
    event_log.start(&config.event_log.file_name)?;
    let recorder: Arc<dyn EventRecorder> = event_log.clone();

    let result = serve_relay(&config, &event_log, recorder).await;

    close_event_log(event_log, Duration::from_secs(config.server.shutdown_timeout_seconds)).await;
    result
}

async fn serve_relay(
    config: &ServiceConfig,
    event_log: &Arc<EventLog>,
    recorder: Arc<dyn EventRecorder>,
) -> Result<(), ServiceError> {
    let store = build_store(&config.storage, recorder.clone()).await?;
    let sender = Arc::new(TelegramSender::new(&config.telegram, recorder.clone())?);
    if config.telegram.bot_token.is_none() {
        warn!("No Telegram bot token configured; webhook replies will fail");
    }

    let metrics = ServiceMetrics::new().map_err(|e| ServiceError::Metrics {
        message: e.to_string(),
    })?;

    let state = AppState::new(config.clone(), recorder.clone(), store, sender, metrics)
        .with_event_log(Arc::clone(event_log));

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting HTTP server"
    );

    start_server(state, shutdown_signal(recorder)).await
}

/// Build the configured message store
async fn build_store(
    config: &StorageConfig,
    recorder: Arc<dyn EventRecorder>,
) -> Result<Arc<dyn MessageStore>, StoreError> {
    match config {
        StorageConfig::Memory => {
            info!("Using in-memory message store");
            Ok(Arc::new(InMemoryMessageStore::new()))
        }
        StorageConfig::Filesystem { path } => {
            info!(path = %path.display(), "Using filesystem message store");
            let store = FilesystemMessageStore::new(path.clone(), recorder).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Close the event log on a blocking thread, giving up after `timeout`
///
/// The blocking task itself is bounded by `timeout`, so a stuck destination
/// cannot hold up the runtime shutdown that follows.
async fn close_event_log(event_log: Arc<EventLog>, timeout: Duration) {
    let closing = tokio::task::spawn_blocking(move || event_log.close_timeout(timeout));

    match closing.await {
        Ok(true) => info!("Event log drained and closed"),
        Ok(false) => warn!(
            timeout_seconds = timeout.as_secs(),
            "Event log did not drain before the shutdown timeout; exiting anyway"
        ),
        Err(e) => error!(error = %e, "Event log close task failed"),
    }
}

/// Assemble, deserialize and validate the service configuration
///
/// `env` replaces the process environment for the `RELAY__` source and the
/// legacy variables when given.
fn load_config(
    explicit_path: Option<&str>,
    env: Option<HashMap<String, String>>,
) -> anyhow::Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/chat-relay/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path {
        builder = builder.add_source(
            config::File::with_name(path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env.clone()),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut service_config: ServiceConfig = settings
        .try_deserialize()
        .context("Could not deserialize service configuration")?;

    match env {
        Some(vars) => service_config.apply_legacy_env(|key| vars.get(key).cloned())?,
        None => service_config.apply_legacy_env(|key| std::env::var(key).ok())?,
    }

    service_config
        .validate()
        .context("Service configuration failed validation")?;

    Ok(service_config)
}

/// Filter used when `RUST_LOG` is not set
fn default_env_filter(level: &str) -> String {
    format!(
        "chat_relay_service={level},chat_relay_api={level},chat_relay_core={level},tower_http=debug"
    )
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_env_filter(&logging.level)));

    let (json_layer, text_layer) = if logging.json_format {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    // A second initialization after a configuration error is ignored
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}
