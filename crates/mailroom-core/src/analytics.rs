//! Write-only newline-delimited JSON event log. Nothing in mailroom reads it back.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailResult;
use crate::model::{EmailSummary, MailboxKind};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsAction {
    MailboxOpened,
    EmailViewed,
    EmailDeleted,
    EmailBackedUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub time_of_day: TimeOfDay,
    pub day_of_week: String,
    pub hour: u32,
}

impl EventContext {
    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            time_of_day: TimeOfDay::from_hour(now.hour()),
            day_of_week: now.weekday().to_string(),
            hour: now.hour(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AnalyticsAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox: Option<MailboxKind>,
    pub context: EventContext,
}

impl AnalyticsEvent {
    pub fn new(action: AnalyticsAction, now: DateTime<Local>) -> Self {
        let seq = EVENT_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("evt-{}-{}", now.timestamp_millis(), seq),
            timestamp: now.with_timezone(&Utc),
            action,
            message_id: None,
            sender: None,
            subject: None,
            mailbox: None,
            context: EventContext::at(now),
        }
    }

    pub fn in_mailbox(mut self, mailbox: MailboxKind) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    pub fn about(mut self, email: &EmailSummary) -> Self {
        self.message_id = Some(email.id.clone());
        self.sender = Some(email.sender_display.clone());
        self.subject = Some(email.subject.clone());
        self
    }
}

/// Appends events to a JSONL file. Writers are serialized through a mutex so
/// concurrent worker tasks never interleave partial lines.
#[derive(Debug)]
pub struct AnalyticsSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AnalyticsSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, event: &AnalyticsEvent) -> MailResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone, Utc};

    use super::{AnalyticsAction, AnalyticsEvent, AnalyticsSink, TimeOfDay};
    use crate::model::{EmailSummary, MailboxKind};

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(20), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
    }

    #[test]
    fn record_appends_one_json_line_per_event() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let sink = AnalyticsSink::new(dir.path().join("nested").join("events.jsonl"));
        let now = Local
            .with_ymd_and_hms(2024, 3, 4, 9, 30, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("ambiguous local time"))?;
        let email = EmailSummary {
            id: "m1".to_string(),
            subject: "Invoice".to_string(),
            sender_display: "Billing".to_string(),
            recipient_display: "me@example.com".to_string(),
            alias_recipient: None,
            received_at: Utc::now(),
            preview_text: String::new(),
            is_unread: true,
        };

        let opened =
            AnalyticsEvent::new(AnalyticsAction::MailboxOpened, now).in_mailbox(MailboxKind::Inbox);
        sink.record(&opened)?;
        sink.record(
            &AnalyticsEvent::new(AnalyticsAction::EmailDeleted, now)
                .in_mailbox(MailboxKind::Inbox)
                .about(&email),
        )?;

        let content = std::fs::read_to_string(sink.path())?;
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["action"], "mailbox_opened");
        assert!(lines[0].get("messageId").is_none());
        assert_eq!(lines[1]["messageId"], "m1");
        assert_eq!(lines[1]["context"]["timeOfDay"], "morning");
        assert_eq!(lines[1]["context"]["dayOfWeek"], "Mon");
        Ok(())
    }
}
