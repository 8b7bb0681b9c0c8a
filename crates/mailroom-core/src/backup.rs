//! Durable local snapshots, one JSON file per backup under `{mailbox}/{backup-id}.json`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{MailError, MailResult};
use crate::model::{BackupRecord, MailboxKind};

static BACKUP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where a backup landed once it is durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReceipt {
    pub backup_id: String,
    pub message_id: String,
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Must only return `Ok` once the record is completely on disk.
    async fn persist(&self, record: &BackupRecord) -> MailResult<BackupReceipt>;
    async fn list(&self, mailbox: Option<MailboxKind>) -> MailResult<Vec<BackupRecord>>;
}

/// Message id plus capture time plus a process-wide sequence, so repeated
/// backups of one message never share a file name.
pub fn new_backup_id(message_id: &str, captured_at: DateTime<Utc>) -> String {
    let seq = BACKUP_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}-{}-{}",
        sanitize_component(message_id),
        captured_at.format("%Y%m%dT%H%M%S%3fZ"),
        seq
    )
}

fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .take(96)
        .collect();
    if cleaned.is_empty() {
        "message".to_string()
    } else {
        cleaned
    }
}

async fn write_then_rename(tmp_path: &Path, final_path: &Path, bytes: &[u8]) -> MailResult<()> {
    let mut file = tokio::fs::File::create(tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp_path, final_path).await?;
    if let Some(dir) = final_path.parent() {
        sync_dir(dir).await?;
    }
    Ok(())
}

/// Flushes the directory entry so a completed rename survives power loss.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> MailResult<()> {
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> MailResult<()> {
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FsBackupStore {
    root: PathBuf,
}

impl FsBackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn mailbox_dir(&self, mailbox: MailboxKind) -> PathBuf {
        self.root.join(mailbox.as_str())
    }
}

#[async_trait]
impl BackupStore for FsBackupStore {
    async fn persist(&self, record: &BackupRecord) -> MailResult<BackupReceipt> {
        let dir = self.mailbox_dir(record.source_mailbox);
        if !tokio::fs::try_exists(&dir).await? {
            tokio::fs::create_dir_all(&dir).await?;
            sync_dir(&self.root).await?;
        }
        let file_name = format!("{}.json", sanitize_component(&record.id));
        let final_path = dir.join(&file_name);
        if tokio::fs::try_exists(&final_path).await? {
            return Err(MailError::Persistence(format!(
                "backup {} already exists",
                final_path.display()
            )));
        }
        let tmp_path = dir.join(format!(".{}.tmp", file_name));
        let bytes = serde_json::to_vec_pretty(record)?;

        if let Err(err) = write_then_rename(&tmp_path, &final_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            warn!(path = %final_path.display(), error = %err, "backup write failed");
            return Err(err);
        }

        debug!(
            backup_id = %record.id,
            message_id = %record.message_id(),
            path = %final_path.display(),
            "backup persisted"
        );
        Ok(BackupReceipt {
            backup_id: record.id.clone(),
            message_id: record.message_id().to_string(),
            path: final_path,
            captured_at: record.captured_at,
        })
    }

    async fn list(&self, mailbox: Option<MailboxKind>) -> MailResult<Vec<BackupRecord>> {
        let kinds: Vec<MailboxKind> = match mailbox {
            Some(kind) => vec![kind],
            None => MailboxKind::ALL.to_vec(),
        };
        let mut records = Vec::new();
        for kind in kinds {
            let dir = self.mailbox_dir(kind);
            if !tokio::fs::try_exists(&dir).await? {
                continue;
            }
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.starts_with('.') || !name.ends_with(".json") {
                    continue;
                }
                let content = tokio::fs::read_to_string(entry.path()).await?;
                match serde_json::from_str::<BackupRecord>(&content) {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        let path = entry.path();
                        warn!(path = %path.display(), error = %err, "skipping unreadable backup");
                    }
                }
            }
        }
        records.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{BackupStore, FsBackupStore, new_backup_id, sync_dir};
    use crate::error::MailError;
    use crate::model::{BackupReason, BackupRecord, FullMessage, MailboxKind};

    fn message(id: &str) -> FullMessage {
        FullMessage {
            id: id.to_string(),
            thread_id: None,
            subject: format!("Subject {}", id),
            from: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            reply_to: Vec::new(),
            received_at: Utc::now(),
            sent_at: None,
            preview: String::new(),
            keywords: Vec::new(),
            text_body: "hello".to_string(),
            html_body: None,
            attachments: Vec::new(),
            size: 5,
        }
    }

    #[test]
    fn backup_ids_for_the_same_message_never_collide() {
        let now = Utc::now();
        let a = new_backup_id("M/1", now);
        let b = new_backup_id("M/1", now);
        assert_ne!(a, b);
        assert!(a.starts_with("M_1-"));
    }

    #[tokio::test]
    async fn persist_writes_one_file_per_mailbox_and_no_temp_leftovers() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FsBackupStore::new(dir.path());
        let record =
            BackupRecord::capture(message("m1"), MailboxKind::Inbox, BackupReason::Deleted);

        let receipt = store.persist(&record).await?;

        assert_eq!(receipt.message_id, "m1");
        assert_eq!(receipt.path.parent(), Some(dir.path().join("inbox").as_path()));
        let names: Vec<String> = std::fs::read_dir(dir.path().join("inbox"))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", record.id)]);

        let back: BackupRecord = serde_json::from_str(&std::fs::read_to_string(&receipt.path)?)?;
        assert_eq!(back, record);
        Ok(())
    }

    #[tokio::test]
    async fn persist_fails_when_root_is_not_a_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("backups");
        std::fs::write(&blocker, b"not a dir")?;
        let store = FsBackupStore::new(&blocker);
        let record = BackupRecord::capture(message("m2"), MailboxKind::Spam, BackupReason::Routine);

        let err = store.persist(&record).await.unwrap_err();
        assert!(matches!(err, MailError::Persistence(_)));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_sync_failure_is_a_persistence_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        sync_dir(dir.path()).await?;
        let err = sync_dir(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, MailError::Persistence(_)));
        Ok(())
    }

    #[tokio::test]
    async fn list_returns_newest_first_and_skips_partial_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FsBackupStore::new(dir.path());
        let older = BackupRecord::capture(message("a"), MailboxKind::Inbox, BackupReason::Routine);
        let mut newer =
            BackupRecord::capture(message("b"), MailboxKind::Trash, BackupReason::Deleted);
        newer.captured_at = older.captured_at + chrono::Duration::seconds(5);
        store.persist(&older).await?;
        store.persist(&newer).await?;
        std::fs::write(dir.path().join("inbox").join(".half.json.tmp"), b"{")?;
        std::fs::write(dir.path().join("inbox").join("garbage.json"), b"{")?;

        let all = store.list(None).await?;
        let ids: Vec<&str> = all.iter().map(|r| r.message_id()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let inbox_only = store.list(Some(MailboxKind::Inbox)).await?;
        assert_eq!(inbox_only.len(), 1);
        Ok(())
    }
}
