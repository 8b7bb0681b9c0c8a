//! Command dispatcher. Commands go in through a bounded queue, each one runs
//! on its own task, and its outcome comes back as exactly one `MailEvent`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use mailroom_core::{
    AnalyticsEvent, AnalyticsSink, AuthFailure, BackupReceipt, BackupStore, EmailSummary,
    FullMessage, MailError, MailResult, MailboxKind,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::guard::{backup_only, delete_with_backup};
use crate::probe::{StatusProbe, speak};
use crate::query::{MailProvider, refresh_mailbox};
use crate::session::{CredentialSource, Session};

const MAIL_CMD_QUEUE_CAPACITY: usize = 256;
const MAIL_EVENT_QUEUE_CAPACITY: usize = 256;
/// Fetch, persist and delete are three round trips.
const GUARD_TIMEOUT_FACTOR: u32 = 3;

#[derive(Debug, Clone)]
pub enum MailCommand {
    /// `attempt` comes back on the completion so a superseded sign-in can be ignored.
    Authenticate {
        attempt: u64,
        session_url: String,
        source: CredentialSource,
    },
    FetchMailbox {
        generation: u64,
        session: Session,
        kind: MailboxKind,
        limit: usize,
    },
    FetchMessage {
        session: Session,
        id: String,
    },
    DeleteEmail {
        session: Session,
        kind: MailboxKind,
        summary: EmailSummary,
    },
    BackupEmail {
        session: Session,
        kind: MailboxKind,
        summary: EmailSummary,
    },
    ProbeStatus,
    Speak {
        text: String,
    },
    Record(AnalyticsEvent),
}

#[derive(Debug, Clone)]
pub enum MailEvent {
    Authenticated {
        attempt: u64,
        result: MailResult<Session>,
    },
    MailboxFetched {
        generation: u64,
        kind: MailboxKind,
        result: MailResult<Vec<EmailSummary>>,
    },
    MessageFetched {
        id: String,
        result: MailResult<FullMessage>,
    },
    EmailDeleted {
        id: String,
        kind: MailboxKind,
        result: MailResult<BackupReceipt>,
    },
    EmailBackedUp {
        id: String,
        kind: MailboxKind,
        result: MailResult<BackupReceipt>,
    },
    StatusProbed {
        name: String,
        result: MailResult<String>,
    },
    Spoken(MailResult<()>),
}

/// Collaborators the workers are allowed to touch.
pub struct EngineConfig {
    pub provider: Arc<dyn MailProvider>,
    pub store: Arc<dyn BackupStore>,
    pub analytics: Option<Arc<AnalyticsSink>>,
    pub probes: Vec<StatusProbe>,
    pub speech: Option<Vec<String>>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct MailEngine {
    tx: mpsc::Sender<MailCommand>,
}

impl MailEngine {
    pub fn start(config: EngineConfig) -> (Self, mpsc::Receiver<MailEvent>) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<MailCommand>(MAIL_CMD_QUEUE_CAPACITY);
        let (evt_tx, evt_rx) = mpsc::channel::<MailEvent>(MAIL_EVENT_QUEUE_CAPACITY);
        let config = Arc::new(config);

        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                debug!(command = command_name(&cmd), "dispatching");
                let config = config.clone();
                let tx = evt_tx.clone();
                tokio::spawn(async move { execute(cmd, &config, &tx).await });
            }
        });

        (Self { tx: cmd_tx }, evt_rx)
    }

    pub fn send(&self, cmd: MailCommand) -> Result<()> {
        match self.tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                warn!(command = command_name(&cmd), "mail command queue full, dropping");
                Err(anyhow!("mail command queue full"))
            }
            Err(TrySendError::Closed(_)) => Err(anyhow!("mail command queue closed")),
        }
    }
}

fn command_name(cmd: &MailCommand) -> &'static str {
    match cmd {
        MailCommand::Authenticate { .. } => "authenticate",
        MailCommand::FetchMailbox { .. } => "fetch_mailbox",
        MailCommand::FetchMessage { .. } => "fetch_message",
        MailCommand::DeleteEmail { .. } => "delete_email",
        MailCommand::BackupEmail { .. } => "backup_email",
        MailCommand::ProbeStatus => "probe_status",
        MailCommand::Speak { .. } => "speak",
        MailCommand::Record(_) => "record",
    }
}

async fn bounded<T>(limit: Duration, work: impl Future<Output = MailResult<T>>) -> MailResult<T> {
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or_else(|_| Err(MailError::timeout(limit)))
}

async fn execute(cmd: MailCommand, config: &EngineConfig, tx: &mpsc::Sender<MailEvent>) {
    let timeout = config.timeout;
    let provider = config.provider.as_ref();
    let store = config.store.as_ref();
    let event = match cmd {
        MailCommand::Authenticate {
            attempt,
            session_url,
            source,
        } => {
            let result = bounded(timeout, async {
                let credential = source.resolve(timeout).await?;
                provider.authenticate(&session_url, credential).await
            })
            .await
            .map_err(|err| match err {
                MailError::Network(detail) => MailError::auth(AuthFailure::Network, detail),
                other => other,
            });
            MailEvent::Authenticated { attempt, result }
        }
        MailCommand::FetchMailbox {
            generation,
            session,
            kind,
            limit,
        } => {
            let result = bounded(timeout, refresh_mailbox(provider, &session, kind, limit)).await;
            MailEvent::MailboxFetched {
                generation,
                kind,
                result,
            }
        }
        MailCommand::FetchMessage { session, id } => {
            let result = bounded(timeout, provider.fetch_full_message(&session, &id)).await;
            MailEvent::MessageFetched { id, result }
        }
        MailCommand::DeleteEmail {
            session,
            kind,
            summary,
        } => {
            let result = bounded(
                timeout * GUARD_TIMEOUT_FACTOR,
                delete_with_backup(provider, store, &session, kind, &summary),
            )
            .await;
            MailEvent::EmailDeleted {
                id: summary.id,
                kind,
                result,
            }
        }
        MailCommand::BackupEmail {
            session,
            kind,
            summary,
        } => {
            let result = bounded(
                timeout * GUARD_TIMEOUT_FACTOR,
                backup_only(provider, store, &session, kind, &summary),
            )
            .await;
            MailEvent::EmailBackedUp {
                id: summary.id,
                kind,
                result,
            }
        }
        MailCommand::ProbeStatus => {
            for probe in config.probes.iter() {
                let result = probe.run(timeout).await;
                let event = MailEvent::StatusProbed {
                    name: probe.name.clone(),
                    result,
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            return;
        }
        MailCommand::Speak { text } => {
            let result = match config.speech.as_deref() {
                Some(command) => speak(command, &text, timeout).await,
                None => Err(MailError::validation("speech", "no speech command configured")),
            };
            MailEvent::Spoken(result)
        }
        MailCommand::Record(event) => {
            if let Some(sink) = config.analytics.clone() {
                let outcome = tokio::task::spawn_blocking(move || sink.record(&event)).await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(error = %err, "analytics event not recorded"),
                    Err(err) => warn!(error = %err, "analytics writer panicked"),
                }
            }
            return;
        }
    };
    let _ = tx.send(event).await;
}
