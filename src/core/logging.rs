//! Global tracing setup: compact stdout output plus a daily rolling file
//! under the data directory's `logs/`. `AppPaths` owns directory
//! creation; this module only installs the subscriber.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::config::AppPaths;

const LOG_FILE: &str = "helpdesk.log";

// Dropping the guard would lose buffered log lines, so it is parked here
// for the process lifetime.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn init(paths: &AppPaths) {
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer);

    // try_init so a second call (e.g. from tests) is a no-op instead of a
    // panic.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
}
