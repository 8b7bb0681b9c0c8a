//! Error taxonomy shared by the protocol layer, the backup guard and the UI.

use std::fmt;

use thiserror::Error;

/// Why an authentication attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Network,
    Unauthorized,
    Malformed,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthFailure::Network => "network",
            AuthFailure::Unauthorized => "unauthorized",
            AuthFailure::Malformed => "malformed",
        };
        f.write_str(label)
    }
}

/// Every failure a dispatched command can complete with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MailError {
    /// Bad or expired credential. Fatal to the current session.
    #[error("authentication failed ({reason}): {detail}")]
    Auth { reason: AuthFailure, detail: String },

    /// Timeout or connection failure.
    #[error("network error: {0}")]
    Network(String),

    /// Mailbox role missing or message id stale.
    #[error("not found: {0}")]
    NotFound(String),

    /// A backup could not be written durably.
    #[error("backup failed: {0}")]
    Persistence(String),

    /// Wizard input rejected.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// The provider answered with something we could not use.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An external helper command failed.
    #[error("command failed: {0}")]
    External(String),
}

pub type MailResult<T> = Result<T, MailError>;

impl MailError {
    pub fn auth(reason: AuthFailure, detail: impl Into<String>) -> Self {
        MailError::Auth {
            reason,
            detail: detail.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MailError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        MailError::Network(format!("timed out after {}s", after.as_secs()))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, MailError::Auth { .. })
    }

    /// Only auth failures invalidate state; everything else keeps the previous view.
    pub fn is_recoverable(&self) -> bool {
        !self.is_auth()
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            MailError::Auth { .. } => "auth",
            MailError::Network(_) => "network",
            MailError::NotFound(_) => "not found",
            MailError::Persistence(_) => "backup",
            MailError::Validation { .. } => "invalid",
            MailError::Protocol(_) => "protocol",
            MailError::External(_) => "command",
        }
    }
}

impl From<std::io::Error> for MailError {
    fn from(err: std::io::Error) -> Self {
        MailError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        MailError::Persistence(err.to_string())
    }
}
