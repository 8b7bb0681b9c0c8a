use std::fmt;
use std::time::Duration;

use mailroom_core::{AuthFailure, MailError, MailResult};
use reqwest::Url;
use serde_json::Value;

use crate::CAPABILITY_MAIL;
use crate::probe::run_command;

/// Bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Where the bearer token comes from. `Command` runs a helper (for example a
/// hardware-key decrypt script) and uses its trimmed stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Inline(String),
    Env(String),
    Command(Vec<String>),
}

impl CredentialSource {
    pub async fn resolve(&self, timeout: Duration) -> MailResult<Credential> {
        let token = match self {
            CredentialSource::Inline(token) => token.trim().to_string(),
            CredentialSource::Env(name) => std::env::var(name)
                .map_err(|_| {
                    MailError::auth(
                        AuthFailure::Malformed,
                        format!("environment variable {} is not set", name),
                    )
                })?
                .trim()
                .to_string(),
            CredentialSource::Command(argv) => run_command(argv, None, timeout)
                .await
                .map_err(|err| MailError::auth(AuthFailure::Malformed, err.to_string()))?,
        };
        if token.is_empty() {
            return Err(MailError::auth(AuthFailure::Malformed, "empty token"));
        }
        Ok(Credential(token))
    }
}

/// An authenticated JMAP session. Immutable once created; an unauthorized
/// answer on any later call means it has to be thrown away.
#[derive(Clone)]
pub struct Session {
    pub api_url: Url,
    pub account_id: String,
    pub username: Option<String>,
    credential: Credential,
}

impl Session {
    pub fn new(api_url: Url, account_id: impl Into<String>, credential: Credential) -> Self {
        Self {
            api_url,
            account_id: account_id.into(),
            username: None,
            credential,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Builds a session from the body of the session resource. A relative
    /// `apiUrl` is resolved against the URL the resource was fetched from.
    pub fn from_resource(
        session_url: &Url,
        body: &Value,
        credential: Credential,
    ) -> MailResult<Self> {
        let malformed = |detail: &str| MailError::auth(AuthFailure::Malformed, detail.to_string());
        let raw_api = body
            .get("apiUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("session is missing apiUrl"))?;
        let api_url = session_url
            .join(raw_api)
            .map_err(|err| malformed(&format!("invalid apiUrl {}: {}", raw_api, err)))?;
        let primary = body
            .get("primaryAccounts")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("session is missing primaryAccounts"))?;
        let account_id = primary
            .get(CAPABILITY_MAIL)
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("no primary account for the mail capability"))?;
        let username = body
            .get("username")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Ok(Self {
            api_url,
            account_id: account_id.to_string(),
            username,
            credential,
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("api_url", &self.api_url.as_str())
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("credential", &self.credential)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mailroom_core::{AuthFailure, MailError};
    use reqwest::Url;
    use serde_json::json;

    use super::{Credential, CredentialSource, Session};

    #[test]
    fn relative_api_url_is_resolved_against_session_url() -> anyhow::Result<()> {
        let base = Url::parse("https://mail.example.com/.well-known/jmap")?;
        let body = json!({
            "apiUrl": "/jmap/api/",
            "username": "me@example.com",
            "accounts": {"u1": {"name": "me"}},
            "primaryAccounts": {"urn:ietf:params:jmap:mail": "u1"}
        });
        let session = Session::from_resource(&base, &body, Credential::new("t"))?;
        assert_eq!(session.api_url.as_str(), "https://mail.example.com/jmap/api/");
        assert_eq!(session.account_id, "u1");
        assert_eq!(session.username.as_deref(), Some("me@example.com"));
        Ok(())
    }

    #[test]
    fn missing_mail_account_is_malformed() -> anyhow::Result<()> {
        let base = Url::parse("https://mail.example.com/session")?;
        let body = json!({
            "apiUrl": "https://api.example.com/",
            "primaryAccounts": {"urn:ietf:params:jmap:contacts": "c1"}
        });
        let err = Session::from_resource(&base, &body, Credential::new("t")).unwrap_err();
        assert!(matches!(
            err,
            MailError::Auth {
                reason: AuthFailure::Malformed,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn debug_output_never_contains_the_token() -> anyhow::Result<()> {
        let session = Session::new(
            Url::parse("https://api.example.com/")?,
            "u1",
            Credential::new("super-secret"),
        );
        let printed = format!("{:?}", session);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
        Ok(())
    }

    #[tokio::test]
    async fn command_source_uses_trimmed_stdout() -> anyhow::Result<()> {
        let source = CredentialSource::Command(vec![
            "sh".to_string(),
            "-c".to_string(),
            "printf '  tok-123\\n'".to_string(),
        ]);
        let credential = source.resolve(Duration::from_secs(5)).await?;
        assert_eq!(credential.bearer(), "tok-123");
        Ok(())
    }

    #[tokio::test]
    async fn empty_inline_token_is_rejected() {
        let err = CredentialSource::Inline("   ".to_string())
            .resolve(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_auth());
    }
}
