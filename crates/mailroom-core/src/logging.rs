use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MAILROOM_LOG";

pub fn log_path() -> PathBuf {
    crate::state_dir().join("mailroom.log")
}

/// The terminal belongs to the UI, so logging only goes to a file and only
/// when `MAILROOM_LOG` is set. Returns whether a subscriber was installed.
pub fn init_logging() -> bool {
    let Ok(raw) = std::env::var(LOG_ENV) else {
        return false;
    };
    let directive = filter_directive(&raw);
    let path = log_path();
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(_) => return false,
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .is_ok()
}

fn filter_directive(raw: &str) -> String {
    match raw.trim() {
        "" | "1" | "true" | "yes" => "debug".to_string(),
        other => other.to_string(),
    }
}
