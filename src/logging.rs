use std::sync::Mutex;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::app_dirs::AppDirs;

pub const LOG_ENV_VAR: &str = "KEYPACE_LOG";

static TRACING_GUARD: Mutex<Option<WorkerGuard>> = Mutex::new(None);

/// Route tracing output to a daily log file; the TUI owns the terminal.
///
/// Filter comes from `KEYPACE_LOG` (default `info`). Calling this twice is
/// harmless: the second subscriber is simply not installed.
pub fn init_tracing() {
    let Some(log_dir) = AppDirs::log_dir() else {
        return;
    };
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "keypace.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_level(true)
        .with_target(true);

    if subscriber.try_init().is_ok() {
        if let Ok(mut slot) = TRACING_GUARD.lock() {
            *slot = Some(guard);
        }
        tracing::info!("tracing initialized");
    }
}
