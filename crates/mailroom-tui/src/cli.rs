use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use mailroom_core::{BackupRecord, BackupStore, FsBackupStore, MailboxKind};
use mailroom_jmap::{JmapClient, MailProvider, Session, refresh_mailbox};
use serde_json::{Value as JsonValue, json};
use tokio::runtime::Runtime;
use tracing::debug;

use super::CLI_SCHEMA_VERSION;
use crate::config_mod::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "mailroom", version, about = "Terminal JMAP mailbox manager")]
pub(crate) struct Cli {
    /// Config file to use instead of ./mailroom.toml or the XDG location.
    #[arg(short = 'c', long = "config", global = true)]
    pub(crate) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Authenticate and print the account's mailboxes.
    Mailboxes,
    /// Print the newest messages of one mailbox.
    List(ListCmd),
    /// Print local backup records, newest first.
    Backups(BackupsCmd),
}

#[derive(Args, Debug)]
pub(crate) struct ListCmd {
    #[arg(long, default_value = "inbox", value_parser = parse_mailbox_kind)]
    mailbox: MailboxKind,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
pub(crate) struct BackupsCmd {
    #[arg(long, value_parser = parse_mailbox_kind)]
    mailbox: Option<MailboxKind>,
}

fn parse_mailbox_kind(raw: &str) -> Result<MailboxKind, String> {
    raw.parse()
}

pub(crate) fn output_ok(value: JsonValue) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&json!({
            "schema": CLI_SCHEMA_VERSION,
            "ok": true,
            "result": value
        }))?
    );
    Ok(())
}

pub(crate) fn output_error(message: &str) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&json!({
            "schema": CLI_SCHEMA_VERSION,
            "ok": false,
            "error": message
        }))?
    );
    Ok(())
}

async fn connect(client: &JmapClient, config: &AppConfig) -> Result<Session> {
    let account = config
        .account
        .as_ref()
        .ok_or_else(|| anyhow!("No account configured"))?;
    let credential = account.credential.resolve(config.request_timeout).await?;
    let session = client.authenticate(&account.session_url, credential).await?;
    debug!(account = %account.name, api = %session.api_url, "cli session ready");
    Ok(session)
}

fn backup_rows(records: &[BackupRecord]) -> JsonValue {
    JsonValue::Array(
        records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "messageId": record.message_id(),
                    "capturedAt": record.captured_at.to_rfc3339(),
                    "mailbox": record.source_mailbox,
                    "reason": record.reason,
                    "subject": record.email_snapshot.subject,
                })
            })
            .collect(),
    )
}

pub(crate) fn run_cli(rt: &Runtime, command: CliCommand, config: &AppConfig) -> Result<()> {
    match command {
        CliCommand::Mailboxes => {
            let client = JmapClient::new(config.request_timeout)?;
            let mailboxes = rt.block_on(async {
                let session = connect(&client, config).await?;
                Ok::<_, anyhow::Error>(client.list_mailboxes(&session).await?)
            })?;
            output_ok(serde_json::to_value(mailboxes)?)
        }
        CliCommand::List(args) => {
            let client = JmapClient::new(config.request_timeout)?;
            let limit = args.limit.unwrap_or(config.fetch_limit).clamp(1, 1000);
            let items = rt.block_on(async {
                let session = connect(&client, config).await?;
                Ok::<_, anyhow::Error>(
                    refresh_mailbox(&client, &session, args.mailbox, limit).await?,
                )
            })?;
            output_ok(serde_json::to_value(items)?)
        }
        CliCommand::Backups(args) => {
            let store = FsBackupStore::new(config.backup_dir.clone());
            let records = rt.block_on(store.list(args.mailbox))?;
            output_ok(backup_rows(&records))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use clap::{CommandFactory, Parser};
    use mailroom_core::{BackupReason, BackupRecord, FullMessage, MailboxKind};

    use super::{Cli, CliCommand, backup_rows};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_accepts_role_aliases_and_global_config() {
        let cli =
            Cli::try_parse_from(["mailroom", "list", "--mailbox", "junk", "-c", "x.toml"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("x.toml")));
        match cli.command {
            Some(CliCommand::List(args)) => {
                assert_eq!(args.mailbox, MailboxKind::Spam);
                assert_eq!(args.limit, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["mailroom", "list", "--mailbox", "archive"]).is_err());
    }

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::try_parse_from(["mailroom"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn backup_rows_expose_ids_and_reason() {
        let message = FullMessage {
            id: "m1".to_string(),
            thread_id: None,
            subject: "Invoice".to_string(),
            from: Vec::new(),
            to: Vec::new(),
            cc: Vec::new(),
            reply_to: Vec::new(),
            received_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            sent_at: None,
            preview: String::new(),
            keywords: Vec::new(),
            text_body: "hello".to_string(),
            html_body: None,
            attachments: Vec::new(),
            size: 5,
        };
        let record = BackupRecord::capture(message, MailboxKind::Trash, BackupReason::Deleted);
        let rows = backup_rows(&[record]);
        assert_eq!(rows[0]["messageId"], "m1");
        assert_eq!(rows[0]["mailbox"], "trash");
        assert_eq!(rows[0]["reason"], "deleted");
        assert_eq!(rows[0]["subject"], "Invoice");
    }
}
