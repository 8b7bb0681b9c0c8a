use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical mailbox role, resolved to a provider mailbox id at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxKind {
    Inbox,
    Spam,
    Trash,
    Sent,
    Drafts,
}

impl MailboxKind {
    pub const ALL: [MailboxKind; 5] = [
        MailboxKind::Inbox,
        MailboxKind::Spam,
        MailboxKind::Trash,
        MailboxKind::Sent,
        MailboxKind::Drafts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MailboxKind::Inbox => "inbox",
            MailboxKind::Spam => "spam",
            MailboxKind::Trash => "trash",
            MailboxKind::Sent => "sent",
            MailboxKind::Drafts => "drafts",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MailboxKind::Inbox => "Inbox",
            MailboxKind::Spam => "Spam",
            MailboxKind::Trash => "Trash",
            MailboxKind::Sent => "Sent",
            MailboxKind::Drafts => "Drafts",
        }
    }

    /// Role names a provider may advertise for this mailbox.
    pub fn roles(self) -> &'static [&'static str] {
        match self {
            MailboxKind::Inbox => &["inbox"],
            MailboxKind::Spam => &["junk", "spam"],
            MailboxKind::Trash => &["trash"],
            MailboxKind::Sent => &["sent"],
            MailboxKind::Drafts => &["drafts"],
        }
    }

    pub fn matches_role(self, role: &str) -> bool {
        self.roles()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(role))
    }

    pub fn next(self) -> MailboxKind {
        let idx = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for MailboxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MailboxKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim();
        MailboxKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(needle) || kind.matches_role(needle))
            .ok_or_else(|| format!("unknown mailbox '{}'", raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxInfo {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub total: u64,
    pub unread: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub email: String,
}

impl EmailAddress {
    pub fn display(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.clone(),
        }
    }

    pub fn full(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.email),
            _ => self.email.clone(),
        }
    }
}

/// The fields needed to render one row of a mailbox list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub id: String,
    pub subject: String,
    pub sender_display: String,
    pub recipient_display: String,
    pub alias_recipient: Option<String>,
    pub received_at: DateTime<Utc>,
    pub preview_text: String,
    pub is_unread: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub blob_id: String,
    pub name: Option<String>,
    pub mime: String,
    pub size: u64,
}

/// Full message content as captured for the detail view and for backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,
    pub received_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub preview: String,
    pub keywords: Vec<String>,
    pub text_body: String,
    pub html_body: Option<String>,
    pub attachments: Vec<AttachmentMeta>,
    pub size: u64,
}

impl FullMessage {
    pub fn sender_line(&self) -> String {
        join_addresses(&self.from)
    }

    pub fn recipient_line(&self) -> String {
        join_addresses(&self.to)
    }
}

fn join_addresses(list: &[EmailAddress]) -> String {
    list.iter()
        .map(EmailAddress::full)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupReason {
    Deleted,
    Archived,
    Routine,
}

/// Append-only snapshot written before anything destructive happens remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    pub source_mailbox: MailboxKind,
    pub reason: BackupReason,
    pub email_snapshot: FullMessage,
}

impl BackupRecord {
    pub fn capture(
        message: FullMessage,
        source_mailbox: MailboxKind,
        reason: BackupReason,
    ) -> Self {
        let captured_at = Utc::now();
        Self {
            id: crate::backup::new_backup_id(&message.id, captured_at),
            captured_at,
            source_mailbox,
            reason,
            email_snapshot: message,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.email_snapshot.id
    }
}

#[cfg(test)]
mod tests {
    use super::{EmailAddress, MailboxKind};

    #[test]
    fn mailbox_kind_parses_labels_and_provider_roles() {
        assert_eq!("Inbox".parse::<MailboxKind>(), Ok(MailboxKind::Inbox));
        assert_eq!("junk".parse::<MailboxKind>(), Ok(MailboxKind::Spam));
        assert_eq!(" trash ".parse::<MailboxKind>(), Ok(MailboxKind::Trash));
        assert!("archive".parse::<MailboxKind>().is_err());
    }

    #[test]
    fn mailbox_kind_cycles_through_every_kind() {
        let mut kind = MailboxKind::Inbox;
        let mut seen = Vec::new();
        for _ in 0..MailboxKind::ALL.len() {
            seen.push(kind);
            kind = kind.next();
        }
        assert_eq!(kind, MailboxKind::Inbox);
        assert_eq!(seen, MailboxKind::ALL.to_vec());
    }

    #[test]
    fn address_display_falls_back_to_email() {
        let named = EmailAddress {
            name: Some("Ada".to_string()),
            email: "ada@example.com".to_string(),
        };
        let bare = EmailAddress {
            name: Some("  ".to_string()),
            email: "bob@example.com".to_string(),
        };
        assert_eq!(named.display(), "Ada");
        assert_eq!(named.full(), "Ada <ada@example.com>");
        assert_eq!(bare.display(), "bob@example.com");
    }
}
