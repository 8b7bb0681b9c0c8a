//! Mailbox Query Engine: role lookup, id queries, summary and full fetches.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailroom_core::{
    AttachmentMeta, EmailAddress, EmailSummary, FullMessage, MailError, MailResult, MailboxInfo,
    MailboxKind,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::client::{Invocation, JmapClient, take_result};
use crate::session::{Credential, Session};

const DETAIL_TEXT_WIDTH: usize = 100;

const SUMMARY_PROPERTIES: &[&str] = &[
    "id",
    "subject",
    "from",
    "to",
    "receivedAt",
    "preview",
    "keywords",
];

const FULL_PROPERTIES: &[&str] = &[
    "id",
    "threadId",
    "subject",
    "from",
    "to",
    "cc",
    "replyTo",
    "receivedAt",
    "sentAt",
    "preview",
    "keywords",
    "size",
    "textBody",
    "htmlBody",
    "bodyValues",
    "attachments",
];

/// Everything the engine needs from a mail provider. `JmapClient` is the real
/// one; tests substitute in-memory fakes.
#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn authenticate(&self, session_url: &str, credential: Credential) -> MailResult<Session>;

    async fn list_mailboxes(&self, session: &Session) -> MailResult<Vec<MailboxInfo>>;

    /// Resolves a logical mailbox kind to the provider's mailbox id.
    async fn list_mailbox_id(&self, session: &Session, kind: MailboxKind) -> MailResult<String> {
        let mailboxes = self.list_mailboxes(session).await?;
        mailboxes
            .into_iter()
            .find(|mailbox| {
                mailbox
                    .role
                    .as_deref()
                    .is_some_and(|role| kind.matches_role(role))
            })
            .map(|mailbox| mailbox.id)
            .ok_or_else(|| MailError::NotFound(format!("no mailbox with role {}", kind)))
    }

    /// Newest first, at most `limit` ids.
    async fn query_message_ids(
        &self,
        session: &Session,
        mailbox_id: &str,
        limit: usize,
    ) -> MailResult<Vec<String>>;

    /// Result order follows `ids`; ids the server no longer knows are skipped.
    async fn fetch_summaries(
        &self,
        session: &Session,
        ids: &[String],
    ) -> MailResult<Vec<EmailSummary>>;

    async fn fetch_full_message(&self, session: &Session, id: &str) -> MailResult<FullMessage>;

    async fn remote_delete(&self, session: &Session, id: &str) -> MailResult<()>;
}

/// Role lookup, id query and summary fetch chained. Any failure aborts the
/// whole refresh so the caller can keep its previous items.
pub async fn refresh_mailbox<P>(
    provider: &P,
    session: &Session,
    kind: MailboxKind,
    limit: usize,
) -> MailResult<Vec<EmailSummary>>
where
    P: MailProvider + ?Sized,
{
    let mailbox_id = provider.list_mailbox_id(session, kind).await?;
    let ids = provider.query_message_ids(session, &mailbox_id, limit).await?;
    let items = provider.fetch_summaries(session, &ids).await?;
    debug!(mailbox = %kind, count = items.len(), "mailbox refreshed");
    Ok(items)
}

#[async_trait]
impl MailProvider for JmapClient {
    async fn authenticate(&self, session_url: &str, credential: Credential) -> MailResult<Session> {
        self.open_session(session_url, credential).await
    }

    async fn list_mailboxes(&self, session: &Session) -> MailResult<Vec<MailboxInfo>> {
        let calls = [Invocation::new(
            "Mailbox/get",
            json!({
                "accountId": session.account_id,
                "ids": null,
                "properties": ["id", "name", "role", "totalEmails", "unreadEmails"]
            }),
            "mb",
        )];
        let result = take_result(self.call(session, &calls).await?, "mb", "Mailbox/get")?;
        Ok(parse_mailboxes(&result))
    }

    async fn query_message_ids(
        &self,
        session: &Session,
        mailbox_id: &str,
        limit: usize,
    ) -> MailResult<Vec<String>> {
        let calls = [Invocation::new(
            "Email/query",
            json!({
                "accountId": session.account_id,
                "filter": {"inMailbox": mailbox_id},
                "sort": [{"property": "receivedAt", "isAscending": false}],
                "limit": limit
            }),
            "q",
        )];
        let result = take_result(self.call(session, &calls).await?, "q", "Email/query")?;
        let mut ids = parse_ids(&result)?;
        ids.truncate(limit);
        Ok(ids)
    }

    async fn fetch_summaries(
        &self,
        session: &Session,
        ids: &[String],
    ) -> MailResult<Vec<EmailSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let calls = [Invocation::new(
            "Email/get",
            json!({
                "accountId": session.account_id,
                "ids": ids,
                "properties": SUMMARY_PROPERTIES
            }),
            "s",
        )];
        let result = take_result(self.call(session, &calls).await?, "s", "Email/get")?;
        Ok(order_summaries(ids, &result, session.username.as_deref()))
    }

    async fn fetch_full_message(&self, session: &Session, id: &str) -> MailResult<FullMessage> {
        let calls = [Invocation::new(
            "Email/get",
            json!({
                "accountId": session.account_id,
                "ids": [id],
                "properties": FULL_PROPERTIES,
                "fetchTextBodyValues": true,
                "fetchHTMLBodyValues": true
            }),
            "f",
        )];
        let result = take_result(self.call(session, &calls).await?, "f", "Email/get")?;
        list_entries(&result)
            .iter()
            .find(|entry| str_field(entry, "id") == Some(id))
            .map(parse_full_message)
            .ok_or_else(|| MailError::NotFound(format!("message {}", id)))
    }

    async fn remote_delete(&self, session: &Session, id: &str) -> MailResult<()> {
        let calls = [Invocation::new(
            "Email/set",
            json!({
                "accountId": session.account_id,
                "destroy": [id]
            }),
            "d",
        )];
        let result = take_result(self.call(session, &calls).await?, "d", "Email/set")?;
        check_destroyed(&result, id)
    }
}

fn list_entries(result: &Value) -> &[Value] {
    result
        .get("list")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn str_field<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
    entry.get(key).and_then(Value::as_str)
}

fn parse_mailboxes(result: &Value) -> Vec<MailboxInfo> {
    list_entries(result)
        .iter()
        .filter_map(|entry| {
            let id = str_field(entry, "id")?;
            Some(MailboxInfo {
                id: id.to_string(),
                name: str_field(entry, "name").unwrap_or("Mailbox").to_string(),
                role: str_field(entry, "role").map(str::to_string),
                total: entry.get("totalEmails").and_then(Value::as_u64).unwrap_or(0),
                unread: entry.get("unreadEmails").and_then(Value::as_u64).unwrap_or(0),
            })
        })
        .collect()
}

fn parse_ids(result: &Value) -> MailResult<Vec<String>> {
    let ids = result
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| MailError::Protocol("Email/query result has no ids".to_string()))?;
    Ok(ids
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

fn parse_addresses(entry: &Value, key: &str) -> Vec<EmailAddress> {
    entry
        .get(key)
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|addr| {
                    let email = str_field(addr, "email")?;
                    Some(EmailAddress {
                        name: str_field(addr, "name").map(str::to_string),
                        email: email.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_time(entry: &Value, key: &str) -> Option<DateTime<Utc>> {
    str_field(entry, key)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn keywords(entry: &Value) -> Vec<String> {
    entry
        .get("keywords")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter(|(_, on)| on.as_bool().unwrap_or(false))
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn subject_of(entry: &Value) -> String {
    match str_field(entry, "subject").map(str::trim) {
        Some(subject) if !subject.is_empty() => subject.to_string(),
        _ => "(no subject)".to_string(),
    }
}

fn parse_summary(entry: &Value, username: Option<&str>) -> Option<EmailSummary> {
    let id = str_field(entry, "id")?;
    let from = parse_addresses(entry, "from");
    let to = parse_addresses(entry, "to");
    let alias_recipient = username.and_then(|me| {
        to.iter()
            .find(|addr| !addr.email.eq_ignore_ascii_case(me))
            .map(|addr| addr.email.clone())
    });
    Some(EmailSummary {
        id: id.to_string(),
        subject: subject_of(entry),
        sender_display: from
            .first()
            .map(EmailAddress::display)
            .unwrap_or_else(|| "(unknown sender)".to_string()),
        recipient_display: to
            .iter()
            .map(EmailAddress::display)
            .collect::<Vec<_>>()
            .join(", "),
        alias_recipient,
        received_at: parse_time(entry, "receivedAt").unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        preview_text: str_field(entry, "preview").unwrap_or("").trim().to_string(),
        is_unread: !keywords(entry).iter().any(|k| k == "$seen"),
    })
}

fn order_summaries(ids: &[String], result: &Value, username: Option<&str>) -> Vec<EmailSummary> {
    let mut by_id: HashMap<String, EmailSummary> = list_entries(result)
        .iter()
        .filter_map(|entry| parse_summary(entry, username))
        .map(|summary| (summary.id.clone(), summary))
        .collect();
    let mut ordered = Vec::with_capacity(ids.len());
    for id in ids {
        match by_id.remove(id) {
            Some(summary) => ordered.push(summary),
            None => debug!(id = %id, "message vanished between query and fetch"),
        }
    }
    ordered
}

fn body_text(entry: &Value, parts_key: &str, mime: &str) -> Option<String> {
    let values = entry.get("bodyValues").and_then(Value::as_object)?;
    let text: Vec<&str> = entry
        .get(parts_key)
        .and_then(Value::as_array)?
        .iter()
        .filter(|part| str_field(part, "type").is_none_or(|t| t.eq_ignore_ascii_case(mime)))
        .filter_map(|part| str_field(part, "partId"))
        .filter_map(|part_id| values.get(part_id))
        .filter_map(|value| str_field(value, "value"))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join("\n"))
    }
}

fn parse_full_message(entry: &Value) -> FullMessage {
    let html_body = body_text(entry, "htmlBody", "text/html");
    let text_body = body_text(entry, "textBody", "text/plain")
        .or_else(|| {
            html_body
                .as_deref()
                .map(|html| html2text::from_read(html.as_bytes(), DETAIL_TEXT_WIDTH))
        })
        .unwrap_or_default();
    let attachments = entry
        .get("attachments")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|part| {
                    Some(AttachmentMeta {
                        blob_id: str_field(part, "blobId")?.to_string(),
                        name: str_field(part, "name").map(str::to_string),
                        mime: str_field(part, "type")
                            .unwrap_or("application/octet-stream")
                            .to_string(),
                        size: part.get("size").and_then(Value::as_u64).unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    FullMessage {
        id: str_field(entry, "id").unwrap_or_default().to_string(),
        thread_id: str_field(entry, "threadId").map(str::to_string),
        subject: subject_of(entry),
        from: parse_addresses(entry, "from"),
        to: parse_addresses(entry, "to"),
        cc: parse_addresses(entry, "cc"),
        reply_to: parse_addresses(entry, "replyTo"),
        received_at: parse_time(entry, "receivedAt").unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        sent_at: parse_time(entry, "sentAt"),
        preview: str_field(entry, "preview").unwrap_or("").to_string(),
        keywords: keywords(entry),
        text_body,
        html_body,
        attachments,
        size: entry.get("size").and_then(Value::as_u64).unwrap_or(0),
    }
}

fn check_destroyed(result: &Value, id: &str) -> MailResult<()> {
    if let Some(failure) = result.get("notDestroyed").and_then(|map| map.get(id)) {
        let kind = str_field(failure, "type").unwrap_or("unknown");
        return Err(if kind == "notFound" {
            MailError::NotFound(format!("message {}", id))
        } else {
            let description = str_field(failure, "description").unwrap_or("");
            MailError::Protocol(
                format!("delete of {} refused: {} {}", id, kind, description)
                    .trim()
                    .to_string(),
            )
        });
    }
    let destroyed = result
        .get("destroyed")
        .and_then(Value::as_array)
        .is_some_and(|list| list.iter().any(|v| v.as_str() == Some(id)));
    if destroyed {
        Ok(())
    } else {
        Err(MailError::Protocol(format!("server did not confirm delete of {}", id)))
    }
}
