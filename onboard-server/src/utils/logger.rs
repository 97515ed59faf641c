//! Logging Infrastructure
//!
//! `RUST_LOG` takes precedence; otherwise the given level applies to this
//! crate, `shared` and `tower_http`.

use tracing_subscriber::EnvFilter;

/// Initialize the logger with stdout output
pub fn init_logger() {
    init_logger_with_file(None, false, None);
}

fn default_filter(level: &str) -> String {
    format!("onboard_server={level},shared={level},tower_http={level}")
}

/// Initialize the logger with optional JSON formatting and daily file output
pub fn init_logger_with_file(log_level: Option<&str>, json: bool, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    let file_appender = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        Some(tracing_appender::rolling::daily(dir, "onboard-server"))
    });

    match (file_appender, json) {
        (Some(writer), true) => subscriber.json().with_writer(writer).init(),
        (Some(writer), false) => subscriber.with_ansi(false).with_writer(writer).init(),
        (None, true) => subscriber.json().init(),
        (None, false) => subscriber.init(),
    }
}
