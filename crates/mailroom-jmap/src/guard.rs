//! Backup Guard. A message is only ever destroyed remotely after its full
//! snapshot is durably on disk.

use mailroom_core::{
    BackupReason, BackupReceipt, BackupRecord, BackupStore, EmailSummary, MailResult, MailboxKind,
};
use tracing::{info, warn};

use crate::query::MailProvider;
use crate::session::Session;

/// fetch full message -> persist backup -> remote delete.
///
/// The first failing step ends the sequence and its error is returned
/// unchanged. A persisted snapshot is kept even if the remote delete fails
/// afterwards; backups are never removed.
pub async fn delete_with_backup<P, S>(
    provider: &P,
    store: &S,
    session: &Session,
    mailbox: MailboxKind,
    summary: &EmailSummary,
) -> MailResult<BackupReceipt>
where
    P: MailProvider + ?Sized,
    S: BackupStore + ?Sized,
{
    let receipt =
        snapshot(provider, store, session, mailbox, summary, BackupReason::Deleted).await?;
    if let Err(err) = provider.remote_delete(session, &summary.id).await {
        warn!(
            message_id = %summary.id,
            backup_id = %receipt.backup_id,
            error = %err,
            "remote delete failed after backup"
        );
        return Err(err);
    }
    info!(message_id = %summary.id, backup_id = %receipt.backup_id, "message deleted");
    Ok(receipt)
}

/// Same snapshot and persist steps, no remote change.
pub async fn backup_only<P, S>(
    provider: &P,
    store: &S,
    session: &Session,
    mailbox: MailboxKind,
    summary: &EmailSummary,
) -> MailResult<BackupReceipt>
where
    P: MailProvider + ?Sized,
    S: BackupStore + ?Sized,
{
    snapshot(provider, store, session, mailbox, summary, BackupReason::Routine).await
}

async fn snapshot<P, S>(
    provider: &P,
    store: &S,
    session: &Session,
    mailbox: MailboxKind,
    summary: &EmailSummary,
    reason: BackupReason,
) -> MailResult<BackupReceipt>
where
    P: MailProvider + ?Sized,
    S: BackupStore + ?Sized,
{
    let message = provider
        .fetch_full_message(session, &summary.id)
        .await
        .inspect_err(|err| warn!(message_id = %summary.id, error = %err, "snapshot fetch failed"))?;
    let record = BackupRecord::capture(message, mailbox, reason);
    store
        .persist(&record)
        .await
        .inspect_err(|err| warn!(message_id = %summary.id, error = %err, "backup not written"))
}
