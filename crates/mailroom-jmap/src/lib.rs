//! JMAP session, mailbox queries, the backup guard and the command engine.

mod client;
mod engine;
mod guard;
mod probe;
mod query;
mod session;

#[cfg(test)]
mod testing;

pub use client::JmapClient;
pub use engine::{EngineConfig, MailCommand, MailEngine, MailEvent};
pub use guard::{backup_only, delete_with_backup};
pub use probe::{StatusProbe, run_command, speak};
pub use query::{MailProvider, refresh_mailbox};
pub use reqwest::Url;
pub use session::{Credential, CredentialSource, Session};

pub const CAPABILITY_CORE: &str = "urn:ietf:params:jmap:core";
pub const CAPABILITY_MAIL: &str = "urn:ietf:params:jmap:mail";
