use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use mailroom_core::{state_dir, xdg_config_dir};
use mailroom_jmap::{CredentialSource, StatusProbe};
use tracing::debug;

const DEFAULT_FETCH_LIMIT: usize = 200;
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PAGE_SIZE: usize = 40;
const TOKEN_ENV: &str = "MAILROOM_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccountSettings {
    pub(crate) name: String,
    pub(crate) session_url: String,
    pub(crate) credential: CredentialSource,
}

#[derive(Debug, Clone)]
pub(crate) struct AppConfig {
    /// File the config was read from, and where the wizard writes back.
    pub(crate) path: PathBuf,
    pub(crate) account: Option<AccountSettings>,
    pub(crate) fetch_limit: usize,
    pub(crate) request_timeout: Duration,
    pub(crate) page_size: usize,
    pub(crate) backup_dir: PathBuf,
    pub(crate) analytics_enabled: bool,
    pub(crate) analytics_path: PathBuf,
    pub(crate) probes: Vec<StatusProbe>,
    pub(crate) speech: Option<Vec<String>>,
    pub(crate) theme: String,
}

pub(crate) fn config_path_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("mailroom.toml"),
        xdg_config_dir().join("mailroom").join("mailroom.toml"),
    ]
}

fn default_config_path() -> PathBuf {
    xdg_config_dir().join("mailroom").join("mailroom.toml")
}

pub(crate) fn default_config_template() -> &'static str {
    r#"# Auto-generated by mailroom on first run.
# Run mailroom and pick "Accounts" to fill in [account], or edit by hand.

# [account]
# name = "Personal"
# session_url = "https://api.fastmail.com/jmap/session"
# token = "..."                      # or token_env = "FASTMAIL_TOKEN"
# token_command = ["pass", "mail/jmap-token"]

[mail]
fetch_limit = 200
request_timeout_secs = 20
page_size = 40

# [backup]
# dir = "/path/to/backups"

[analytics]
enabled = true

# [[status]]
# name = "battery"
# command = ["sh", "-c", "cat /sys/class/power_supply/BAT0/capacity"]

# [speech]
# command = ["espeak"]

[ui]
theme = "default"                    # default, nord, gruvbox, dracula
"#
}

/// Writes the template to the XDG location unless some candidate exists.
pub(crate) fn ensure_default_config_exists() -> Result<()> {
    if config_path_candidates().iter().any(|path| path.exists()) {
        return Ok(());
    }
    write_text_atomic(&default_config_path(), default_config_template())
}

pub(crate) fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content, false)
}

/// Like `write_text_atomic`, but the result is readable by the owner only.
pub(crate) fn write_secret_atomic(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content, true)
}

fn write_atomic(path: &Path, content: &str, owner_only: bool) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("not a file path: {}", path.display()))?;
    let tmp = parent.join(format!(".{}.tmp", file_name));
    {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            if owner_only {
                options.mode(0o600);
            }
        }
        let mut file = options.open(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    // Keep the permissions of a file the user already restricted.
    if let Ok(meta) = std::fs::metadata(path) {
        std::fs::set_permissions(&tmp, meta.permissions())?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if owner_only {
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    #[cfg(not(unix))]
    let _ = owner_only;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let (path, content) = match explicit {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            (path.to_path_buf(), content)
        }
        None => config_path_candidates()
            .into_iter()
            .find_map(|path| std::fs::read_to_string(&path).ok().map(|c| (path, c)))
            .unwrap_or_else(|| (default_config_path(), String::new())),
    };
    let value: toml::Value = toml::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    let mut config = parse_config(&value, path);
    // Resolved lazily so the token itself never reaches a config rewrite.
    if std::env::var_os(TOKEN_ENV).is_some() {
        if let Some(account) = config.account.as_mut() {
            account.credential = CredentialSource::Env(TOKEN_ENV.to_string());
        }
    }
    debug!(path = %config.path.display(), account = config.account.is_some(), "config loaded");
    Ok(config)
}

pub(crate) fn parse_config(value: &toml::Value, path: PathBuf) -> AppConfig {
    let mail = value.get("mail");
    let int = |key: &str| mail.and_then(|m| m.get(key)).and_then(|v| v.as_integer());
    let state = state_dir();
    let analytics = value.get("analytics");
    AppConfig {
        path,
        account: value.get("account").and_then(parse_account_table),
        fetch_limit: int("fetch_limit")
            .map(|v| v.clamp(1, 1000) as usize)
            .unwrap_or(DEFAULT_FETCH_LIMIT),
        request_timeout: Duration::from_secs(
            int("request_timeout_secs")
                .map(|v| v.clamp(1, 300) as u64)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
        page_size: int("page_size")
            .map(|v| v.clamp(5, 200) as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE),
        backup_dir: value
            .get("backup")
            .and_then(|b| b.get("dir"))
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(|| state.join("backups")),
        analytics_enabled: analytics
            .and_then(|a| a.get("enabled"))
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
        analytics_path: analytics
            .and_then(|a| a.get("path"))
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(|| state.join("events.jsonl")),
        probes: value
            .get("status")
            .and_then(|v| v.as_array())
            .map(|list| list.iter().filter_map(parse_probe_table).collect())
            .unwrap_or_default(),
        speech: value
            .get("speech")
            .and_then(|s| s.get("command"))
            .and_then(parse_argv),
        theme: value
            .get("ui")
            .and_then(|ui| ui.get("theme"))
            .and_then(|v| v.as_str())
            .unwrap_or("default")
            .to_string(),
    }
}

fn parse_argv(value: &toml::Value) -> Option<Vec<String>> {
    let argv: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    if argv.is_empty() { None } else { Some(argv) }
}

fn parse_account_table(account: &toml::Value) -> Option<AccountSettings> {
    let credential = if let Some(token) = account.get("token").and_then(|v| v.as_str()) {
        CredentialSource::Inline(token.to_string())
    } else if let Some(name) = account.get("token_env").and_then(|v| v.as_str()) {
        CredentialSource::Env(name.to_string())
    } else {
        CredentialSource::Command(account.get("token_command").and_then(parse_argv)?)
    };
    let session_url = account.get("session_url")?.as_str()?.to_string();
    let name = account
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("account")
        .to_string();
    Some(AccountSettings {
        name,
        session_url,
        credential,
    })
}

fn parse_probe_table(probe: &toml::Value) -> Option<StatusProbe> {
    Some(StatusProbe {
        name: probe.get("name")?.as_str()?.to_string(),
        command: probe.get("command").and_then(parse_argv)?,
    })
}

fn account_table(account: &AccountSettings) -> toml::Table {
    let mut table = toml::Table::new();
    table.insert("name".into(), toml::Value::String(account.name.clone()));
    table.insert(
        "session_url".into(),
        toml::Value::String(account.session_url.clone()),
    );
    match &account.credential {
        CredentialSource::Inline(token) => {
            table.insert("token".into(), toml::Value::String(token.clone()));
        }
        CredentialSource::Env(name) => {
            table.insert("token_env".into(), toml::Value::String(name.clone()));
        }
        CredentialSource::Command(argv) => {
            table.insert(
                "token_command".into(),
                toml::Value::Array(argv.iter().cloned().map(toml::Value::String).collect()),
            );
        }
    }
    table
}

/// Replaces the `[account]` table in `path`, keeping every other table. A file
/// holding an inline token ends up owner-only.
pub(crate) fn save_account(path: &Path, account: &AccountSettings) -> Result<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(err.into()),
    };
    let mut root: toml::Table = toml::from_str(&existing)
        .with_context(|| format!("parsing {}", path.display()))?;
    root.insert("account".into(), toml::Value::Table(account_table(account)));
    let content = toml::to_string(&root)?;
    match account.credential {
        CredentialSource::Inline(_) => write_secret_atomic(path, &content),
        _ => write_text_atomic(path, &content),
    }
}
