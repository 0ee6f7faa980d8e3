//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and, optionally, a
//! JSON log file per process.

use crate::config::{ConfigManager, LoggingConfig};
use chrono::Utc;
use std::fs;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));

        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let mut guard = None;
        let file_layer = if config.file_output && fs::create_dir_all(&config.directory).is_ok() {
            let file_name = format!(
                "{}.{}.{}.log",
                environment,
                process::id(),
                Utc::now().format("%Y%m%d_%H%M%S")
            );
            let appender = tracing_appender::rolling::never(&config.directory, file_name);
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
        } else {
            None
        };

        // Another subscriber (e.g. a host application's) may already be installed
        if tracing_subscriber::registry()
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            level = %log_level,
            file_output = guard.is_some(),
            "Structured logging initialized"
        );

        guard
    });
}

/// Default filter for an environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for an applied order transition
pub fn log_order_operation(
    operation: &str,
    order_id: Option<i64>,
    work_id: Option<&str>,
    actor: &str,
    status: &str,
    step: Option<u32>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        order_id = order_id,
        work_id = work_id,
        actor = %actor,
        status = %status,
        step = step,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ORDER_OPERATION"
    );
}

/// Log a rejected workflow call with its reason
pub fn log_workflow_rejection(operation: &str, order_id: Option<i64>, actor: &str, error: &str) {
    tracing::warn!(
        operation = %operation,
        order_id = order_id,
        actor = %actor,
        error = %error,
        "WORKFLOW_REJECTED"
    );
}
