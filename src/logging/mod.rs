/*!
 * Logging Module
 * Subscriber setup and HTTP request logging
 */
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::AppConfig;

/// Background writer guards. Dropping them flushes and stops the writers,
/// so they must live as long as the process logs.
#[must_use = "dropping the guards stops the log writers"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Default filter directive when `RUST_LOG` is not set.
pub fn default_directive(log_level: &str) -> String {
    format!(
        "portfolio_content={},tower_http=debug,axum=info,sqlx=warn",
        log_level
    )
}

/// Level used when `LOG_LEVEL` is not set.
pub fn default_level(config: &AppConfig) -> &'static str {
    if config.is_production() {
        "info"
    } else {
        "debug"
    }
}

/// Initialize the logging system
pub fn init(config: &AppConfig) -> LogGuards {
    let is_production = config.is_production();

    // Create log directory if it doesn't exist
    std::fs::create_dir_all("logs").ok();

    // File appender for all logs
    let (file_writer, file_guard) = non_blocking(rolling::daily("logs", "app.log"));

    // Console writer
    let (console_writer, console_guard) = non_blocking(io::stdout());

    let log_level =
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_level(config).to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&log_level)));

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let mut guards = vec![file_guard, console_guard];

    if is_production {
        // Errors only, kept apart for alerting
        let (error_writer, error_guard) = non_blocking(rolling::daily("logs", "error.log"));
        guards.push(error_guard);

        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber.with(file_layer).with(console_layer).init();
    }

    tracing::info!("Logging initialized for {} environment", config.environment);

    LogGuards { _guards: guards }
}
