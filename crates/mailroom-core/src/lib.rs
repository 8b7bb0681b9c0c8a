//! Shared model, error taxonomy and local persistence for mailroom.

mod analytics;
mod backup;
mod error;
mod logging;
mod model;

pub use analytics::{AnalyticsAction, AnalyticsEvent, AnalyticsSink, EventContext, TimeOfDay};
pub use backup::{BackupReceipt, BackupStore, FsBackupStore, new_backup_id};
pub use error::{AuthFailure, MailError, MailResult};
pub use logging::{init_logging, log_path};
pub use model::{
    AttachmentMeta, BackupReason, BackupRecord, EmailAddress, EmailSummary, FullMessage,
    MailboxInfo, MailboxKind,
};

use std::path::PathBuf;

pub fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub fn xdg_state_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Directory for everything mailroom writes at runtime (log, backups, event log).
pub fn state_dir() -> PathBuf {
    xdg_state_dir().join("mailroom")
}
