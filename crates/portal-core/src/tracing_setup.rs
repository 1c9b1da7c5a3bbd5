use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::constants::{LOG_FILE_ENV, LOG_FILTER_ENV};

pub fn init_tracing() {
    init_tracing_with_service("portal-notify");
}

pub fn init_tracing_with_service(service_name: &str) {
    // Check if file logging is enabled via environment variable
    let file_logging = std::env::var(LOG_FILE_ENV).ok();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(LOG_FILTER_ENV)
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = file_logging.and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => Some((log_path, file)),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    if let Some((log_path, file)) = file {
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(LevelFilter::DEBUG);

        // A subscriber may already be installed (tests, embedding apps)
        let _ = registry.with(file_layer).try_init();
        tracing::info!(service = service_name, log_path = %log_path, "file logging enabled");
    } else {
        let _ = registry.try_init();
    }
}
