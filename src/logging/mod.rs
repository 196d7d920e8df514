/*!
 * Logging Module
 * Centralized logging configuration and utilities
 */
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter directives when `RUST_LOG` is not set.
fn default_directives(log_level: &str) -> String {
    format!(
        "portfolio_manager={},tower_http=info,axum=info,sqlx=warn",
        log_level
    )
}

/// Initialize the logging system.
///
/// Returns the writer guards; the caller must keep them alive for the
/// lifetime of the process or buffered lines are lost on exit.
pub fn init(is_production: bool) -> Vec<WorkerGuard> {
    // Create log directory if it doesn't exist
    std::fs::create_dir_all("logs").ok();

    // File appender for all logs
    let (file_writer, file_guard) = non_blocking(rolling::daily("logs", "app.log"));

    // File appender for errors only
    let (error_writer, error_guard) = non_blocking(rolling::daily("logs", "error.log"));

    // Console writer
    let (console_writer, console_guard) = non_blocking(io::stdout());

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if is_production {
            "info".to_string()
        } else {
            "debug".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&log_level)));

    // The error file is written in every environment.
    let error_layer = fmt::layer()
        .json()
        .with_writer(error_writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(error_layer);

    if is_production {
        // JSON format for production
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber.with(file_layer).with(console_layer).init();
    } else {
        // Pretty format for development
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

    tracing::info!(
        production = is_production,
        level = %log_level,
        "Logging initialized"
    );

    vec![file_guard, error_guard, console_guard]
}
