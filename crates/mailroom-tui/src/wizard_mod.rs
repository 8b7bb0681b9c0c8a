//! Linear account setup: each field is committed in order and the last commit
//! yields the finished account.

use mailroom_core::MailError;
use mailroom_jmap::CredentialSource;

use crate::config_mod::AccountSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WizardField {
    Name,
    SessionUrl,
    Token,
}

impl WizardField {
    pub(crate) const ORDER: [WizardField; 3] =
        [WizardField::Name, WizardField::SessionUrl, WizardField::Token];

    pub(crate) fn label(self) -> &'static str {
        match self {
            WizardField::Name => "Account name",
            WizardField::SessionUrl => "Session URL",
            WizardField::Token => "API token",
        }
    }

    pub(crate) fn hint(self) -> &'static str {
        match self {
            WizardField::Name => "shown in the status bar",
            WizardField::SessionUrl => "e.g. https://api.fastmail.com/jmap/session",
            WizardField::Token => "bearer token with mail scope",
        }
    }

    pub(crate) fn is_secret(self) -> bool {
        matches!(self, WizardField::Token)
    }

    fn key(self) -> &'static str {
        match self {
            WizardField::Name => "name",
            WizardField::SessionUrl => "session_url",
            WizardField::Token => "token",
        }
    }

    fn validate(self, raw: &str) -> Result<String, MailError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(MailError::validation(self.key(), "required"));
        }
        if self == WizardField::SessionUrl
            && !(value.starts_with("https://") || value.starts_with("http://"))
        {
            return Err(MailError::validation(
                self.key(),
                "must start with https:// or http://",
            ));
        }
        Ok(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WizardStep {
    Continue,
    Invalid,
    Done(AccountSettings),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Wizard {
    pub(crate) step: usize,
    pub(crate) input: String,
    pub(crate) values: Vec<String>,
    pub(crate) error: Option<String>,
    /// Credential of the account being edited; an empty token keeps it.
    pub(crate) kept: Option<CredentialSource>,
}

impl Wizard {
    /// Pre-fills the first field with the current account name, if any.
    pub(crate) fn new(existing: Option<&AccountSettings>) -> Self {
        Self {
            step: 0,
            input: existing.map(|a| a.name.clone()).unwrap_or_default(),
            values: Vec::new(),
            error: None,
            kept: existing.map(|a| a.credential.clone()),
        }
    }

    pub(crate) fn hint(&self) -> &'static str {
        match (self.field(), &self.kept) {
            (WizardField::Token, Some(CredentialSource::Inline(_))) => {
                "leave empty to keep the current token"
            }
            (WizardField::Token, Some(CredentialSource::Env(_))) => {
                "leave empty to keep reading the token from the environment"
            }
            (WizardField::Token, Some(CredentialSource::Command(_))) => {
                "leave empty to keep the token command"
            }
            (field, _) => field.hint(),
        }
    }

    pub(crate) fn field(&self) -> WizardField {
        WizardField::ORDER[self.step.min(WizardField::ORDER.len() - 1)]
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        self.input.push(ch);
    }

    pub(crate) fn pop_char(&mut self) {
        self.input.pop();
    }

    pub(crate) fn commit(&mut self) -> WizardStep {
        let field = self.field();
        if field == WizardField::Token && self.input.trim().is_empty() {
            if let Some(credential) = self.kept.clone() {
                self.error = None;
                self.step += 1;
                return self.finish(credential);
            }
        }
        match field.validate(&self.input) {
            Err(err) => {
                self.error = Some(err.to_string());
                WizardStep::Invalid
            }
            Ok(value) => {
                self.error = None;
                self.values.push(value);
                self.input.clear();
                self.step += 1;
                if self.step < WizardField::ORDER.len() {
                    return WizardStep::Continue;
                }
                self.finish(CredentialSource::Inline(self.values[2].clone()))
            }
        }
    }

    fn finish(&self, credential: CredentialSource) -> WizardStep {
        WizardStep::Done(AccountSettings {
            name: self.values[0].clone(),
            session_url: self.values[1].clone(),
            credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use mailroom_jmap::CredentialSource;

    use super::{Wizard, WizardField, WizardStep};
    use crate::config_mod::AccountSettings;

    fn type_str(wizard: &mut Wizard, text: &str) {
        for ch in text.chars() {
            wizard.push_char(ch);
        }
    }

    #[test]
    fn empty_field_stays_put_with_inline_error() {
        let mut wizard = Wizard::new(None);
        assert_eq!(wizard.commit(), WizardStep::Invalid);
        assert_eq!(wizard.field(), WizardField::Name);
        assert_eq!(wizard.error.as_deref(), Some("name: required"));
    }

    #[test]
    fn fields_are_visited_in_order_and_produce_an_account() {
        let mut wizard = Wizard::new(None);
        type_str(&mut wizard, "Personal");
        assert_eq!(wizard.commit(), WizardStep::Continue);
        assert_eq!(wizard.field(), WizardField::SessionUrl);

        type_str(&mut wizard, "ftp://nope");
        assert_eq!(wizard.commit(), WizardStep::Invalid);
        assert_eq!(wizard.field(), WizardField::SessionUrl);
        wizard.input.clear();
        type_str(&mut wizard, "https://api.example.com/jmap/session");
        assert_eq!(wizard.commit(), WizardStep::Continue);
        assert!(wizard.error.is_none());

        type_str(&mut wizard, " secret ");
        match wizard.commit() {
            WizardStep::Done(account) => {
                assert_eq!(account.name, "Personal");
                assert_eq!(account.session_url, "https://api.example.com/jmap/session");
                assert_eq!(account.credential, CredentialSource::Inline("secret".to_string()));
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn editing_with_an_empty_token_keeps_the_token_command() {
        let command = CredentialSource::Command(vec!["pass".to_string(), "mail/jmap".to_string()]);
        let existing = AccountSettings {
            name: "Work".to_string(),
            session_url: "https://old.example.com/jmap/session".to_string(),
            credential: command.clone(),
        };
        let mut wizard = Wizard::new(Some(&existing));
        assert_eq!(wizard.commit(), WizardStep::Continue);
        type_str(&mut wizard, "https://new.example.com/jmap/session");
        assert_eq!(wizard.commit(), WizardStep::Continue);
        assert_eq!(wizard.hint(), "leave empty to keep the token command");

        match wizard.commit() {
            WizardStep::Done(account) => {
                assert_eq!(account.name, "Work");
                assert_eq!(account.session_url, "https://new.example.com/jmap/session");
                assert_eq!(account.credential, command);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn new_account_still_requires_a_token() {
        let mut wizard = Wizard::new(None);
        type_str(&mut wizard, "Home");
        wizard.commit();
        type_str(&mut wizard, "https://api.example.com/jmap/session");
        wizard.commit();
        assert_eq!(wizard.commit(), WizardStep::Invalid);
        assert_eq!(wizard.field(), WizardField::Token);
        assert_eq!(wizard.error.as_deref(), Some("token: required"));
    }

    #[test]
    fn backspace_edits_current_input() {
        let mut wizard = Wizard::new(None);
        type_str(&mut wizard, "abc");
        wizard.pop_char();
        assert_eq!(wizard.input, "ab");
    }
}
