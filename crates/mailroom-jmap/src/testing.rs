//! In-process fakes shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mailroom_core::{
    BackupReceipt, BackupRecord, BackupStore, EmailSummary, FullMessage, MailError, MailResult,
    MailboxInfo, MailboxKind,
};
use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::query::MailProvider;
use crate::session::{Credential, Session};

pub(crate) type Journal = Arc<Mutex<Vec<String>>>;

fn push(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

pub(crate) fn test_session() -> Session {
    Session::new(
        Url::parse("http://127.0.0.1:9/api").unwrap(),
        "u1",
        Credential::new("t"),
    )
}

pub(crate) fn summary(id: &str) -> EmailSummary {
    EmailSummary {
        id: id.to_string(),
        subject: format!("Subject {}", id),
        sender_display: "Ann".to_string(),
        recipient_display: "me@example.com".to_string(),
        alias_recipient: None,
        received_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        preview_text: String::new(),
        is_unread: false,
    }
}

fn full_from(summary: &EmailSummary) -> FullMessage {
    FullMessage {
        id: summary.id.clone(),
        thread_id: None,
        subject: summary.subject.clone(),
        from: Vec::new(),
        to: Vec::new(),
        cc: Vec::new(),
        reply_to: Vec::new(),
        received_at: summary.received_at,
        sent_at: None,
        preview: summary.preview_text.clone(),
        keywords: Vec::new(),
        text_body: format!("body of {}", summary.id),
        html_body: None,
        attachments: Vec::new(),
        size: 0,
    }
}

/// Provider with a fixed set of mailboxes and one message list shared by all
/// of them. Every call is appended to the journal.
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub messages: Vec<EmailSummary>,
    pub fail_auth: Option<MailError>,
    pub fail_query: Option<MailError>,
    pub fail_full: Option<MailError>,
    pub fail_delete: Option<MailError>,
    pub delay: Option<std::time::Duration>,
    pub journal: Journal,
}

impl FakeProvider {
    pub fn with_messages(messages: Vec<EmailSummary>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailProvider for FakeProvider {
    async fn authenticate(
        &self,
        _session_url: &str,
        credential: Credential,
    ) -> MailResult<Session> {
        push(&self.journal, "authenticate".to_string());
        if let Some(err) = &self.fail_auth {
            return Err(err.clone());
        }
        let base = test_session();
        Ok(Session::new(base.api_url, base.account_id, credential))
    }

    async fn list_mailboxes(&self, _session: &Session) -> MailResult<Vec<MailboxInfo>> {
        push(&self.journal, "mailboxes".to_string());
        Ok(["inbox", "junk", "trash", "sent"]
            .iter()
            .map(|role| MailboxInfo {
                id: format!("mb-{}", role),
                name: role.to_string(),
                role: Some(role.to_string()),
                total: 0,
                unread: 0,
            })
            .collect())
    }

    async fn query_message_ids(
        &self,
        _session: &Session,
        mailbox_id: &str,
        limit: usize,
    ) -> MailResult<Vec<String>> {
        push(&self.journal, format!("query:{}", mailbox_id));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.fail_query {
            return Err(err.clone());
        }
        Ok(self.messages.iter().take(limit).map(|m| m.id.clone()).collect())
    }

    async fn fetch_summaries(
        &self,
        _session: &Session,
        ids: &[String],
    ) -> MailResult<Vec<EmailSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        push(&self.journal, format!("summaries:{}", ids.len()));
        Ok(ids
            .iter()
            .filter_map(|id| self.messages.iter().find(|m| &m.id == id).cloned())
            .collect())
    }

    async fn fetch_full_message(&self, _session: &Session, id: &str) -> MailResult<FullMessage> {
        push(&self.journal, format!("full:{}", id));
        if let Some(err) = &self.fail_full {
            return Err(err.clone());
        }
        self.messages
            .iter()
            .find(|m| m.id == id)
            .map(full_from)
            .ok_or_else(|| MailError::NotFound(format!("message {}", id)))
    }

    async fn remote_delete(&self, _session: &Session, id: &str) -> MailResult<()> {
        push(&self.journal, format!("delete:{}", id));
        match &self.fail_delete {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Backup store that keeps records in memory, or refuses every write.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub fail: Option<MailError>,
    pub records: Mutex<Vec<BackupRecord>>,
    pub journal: Journal,
}

impl MemoryStore {
    pub fn sharing(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            ..Self::default()
        }
    }

    pub fn failing(journal: &Journal, err: MailError) -> Self {
        Self {
            fail: Some(err),
            journal: journal.clone(),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<BackupRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackupStore for MemoryStore {
    async fn persist(&self, record: &BackupRecord) -> MailResult<BackupReceipt> {
        push(&self.journal, format!("persist:{}", record.message_id()));
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(BackupReceipt {
            backup_id: record.id.clone(),
            message_id: record.message_id().to_string(),
            path: format!("{}/{}.json", record.source_mailbox, record.id).into(),
            captured_at: record.captured_at,
        })
    }

    async fn list(&self, mailbox: Option<MailboxKind>) -> MailResult<Vec<BackupRecord>> {
        let mut records: Vec<BackupRecord> = self
            .records()
            .into_iter()
            .filter(|r| mailbox.is_none_or(|kind| r.source_mailbox == kind))
            .collect();
        records.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(records)
    }
}

pub(crate) struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Minimal HTTP/1.1 responder: answers each accepted connection with the next
/// scripted reply and closes it. Request heads and bodies are recorded.
pub(crate) struct FakeServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    pub async fn start(replies: Vec<Reply>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base = format!("http://{}", listener.local_addr()?);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        tokio::spawn(async move {
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok(raw) = read_request(&mut stream).await else {
                    return;
                };
                seen.lock().unwrap().push(raw);
                let head = format!(
                    "HTTP/1.1 {} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    reply.status,
                    reply.body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(reply.body.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        Ok(Self { base, requests })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(String::from_utf8_lossy(&buf).into_owned());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let body_len = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + body_len {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
