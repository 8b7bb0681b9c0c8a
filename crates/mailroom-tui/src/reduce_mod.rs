//! The reducer: every key, engine completion and tick goes through
//! `reduce(app, msg) -> (app', effects)`. Nothing here touches the terminal,
//! the network or the disk.

use chrono::Local;
use mailroom_core::{AnalyticsAction, AnalyticsEvent, EmailSummary, MailError, MailboxKind};
use mailroom_jmap::{MailCommand, MailEvent};
use tracing::debug;

use super::App;
use crate::config_mod::AccountSettings;
use crate::input_mod::{Key, page_shortcut};
use crate::mailbox_mod::MailboxView;
use crate::nav_mod::{
    AccountChoice, Choice, DetailView, MailboxChoice, MainChoice, Menu, Screen, ScreenId,
};
use crate::wizard_mod::{Wizard, WizardStep};

const DETAIL_PAGE: u16 = 10;

#[derive(Debug)]
pub(crate) enum Msg {
    Key(Key),
    Engine(MailEvent),
    Tick,
    Notice(String),
}

#[derive(Debug)]
pub(crate) enum Effect {
    Dispatch(MailCommand),
    SaveAccount(AccountSettings),
    Quit,
}

pub(crate) fn reduce(mut app: App, msg: Msg) -> (App, Vec<Effect>) {
    let effects = match msg {
        Msg::Key(key) => app.on_key(key),
        Msg::Engine(event) => app.on_mail_event(event),
        Msg::Tick => {
            app.spinner = app.spinner.wrapping_add(1);
            Vec::new()
        }
        Msg::Notice(text) => {
            app.status = Some(text);
            Vec::new()
        }
    };
    (app, effects)
}

enum Picked {
    Main(MainChoice),
    Mailbox(MailboxChoice),
    Account(AccountChoice),
}

fn steer<C: Choice>(menu: &mut Menu<C>, key: Key) -> Option<C> {
    match key {
        Key::Up | Key::Char('k') => menu.move_up(),
        Key::Down | Key::Char('j') => menu.move_down(),
        Key::Enter | Key::Right | Key::Char('l') => return menu.selected(),
        _ => {}
    }
    None
}

fn is_back(key: Key) -> bool {
    matches!(key, Key::Esc | Key::Left | Key::Backspace | Key::Char('h'))
}

fn record(action: AnalyticsAction, kind: MailboxKind, summary: Option<&EmailSummary>) -> Effect {
    let mut event = AnalyticsEvent::new(action, Local::now()).in_mailbox(kind);
    if let Some(summary) = summary {
        event = event.about(summary);
    }
    Effect::Dispatch(MailCommand::Record(event))
}

impl App {
    /// Builds a screen with its remembered cursor. Leaf screens carry their
    /// own data and are never a back target, so they fall back to the root.
    pub(crate) fn screen_for(&self, id: ScreenId) -> Screen {
        let cursor = self.memory.recall(id);
        let configured = self.account.is_some();
        match id {
            ScreenId::MainMenu => Screen::MainMenu(Menu::new(MainChoice::all(), cursor)),
            ScreenId::MailboxMenu => {
                Screen::MailboxMenu(Menu::new(MailboxChoice::for_account(configured), cursor))
            }
            ScreenId::AccountMenu => {
                Screen::AccountMenu(Menu::new(AccountChoice::for_account(configured), cursor))
            }
            ScreenId::Status => Screen::Status,
            ScreenId::EmailList => Screen::EmailList,
            ScreenId::EmailDetail | ScreenId::AccountWizard => self.screen_for(ScreenId::MainMenu),
        }
    }

    fn enter(&mut self, next: Screen) {
        self.memory.remember(&self.screen);
        self.screen = next;
    }

    fn go_back(&mut self) -> Vec<Effect> {
        if let Some(parent) = self.screen.id().parent() {
            self.screen = self.screen_for(parent);
        }
        Vec::new()
    }

    fn on_key(&mut self, key: Key) -> Vec<Effect> {
        if key == Key::Interrupt {
            return vec![Effect::Quit];
        }
        if self.screen.id() == ScreenId::AccountWizard {
            return self.on_key_wizard(key);
        }
        self.status = None;
        if key == Key::Char('q') {
            return vec![Effect::Quit];
        }
        if is_back(key) {
            return self.go_back();
        }
        match self.screen.id() {
            ScreenId::Status => self.on_key_status(key),
            ScreenId::EmailList => self.on_key_list(key),
            ScreenId::EmailDetail => self.on_key_detail(key),
            _ => self.on_key_menu(key),
        }
    }

    fn on_key_menu(&mut self, key: Key) -> Vec<Effect> {
        let picked = match &mut self.screen {
            Screen::MainMenu(menu) => steer(menu, key).map(Picked::Main),
            Screen::MailboxMenu(menu) => steer(menu, key).map(Picked::Mailbox),
            Screen::AccountMenu(menu) => steer(menu, key).map(Picked::Account),
            _ => None,
        };
        match picked {
            Some(Picked::Main(choice)) => self.select_main(choice),
            Some(Picked::Mailbox(choice)) => self.select_mailbox(choice),
            Some(Picked::Account(choice)) => self.select_account(choice),
            None => Vec::new(),
        }
    }

    fn select_main(&mut self, choice: MainChoice) -> Vec<Effect> {
        match choice {
            MainChoice::ReadEmails => {
                self.enter(self.screen_for(ScreenId::MailboxMenu));
                Vec::new()
            }
            MainChoice::Account => {
                self.enter(self.screen_for(ScreenId::AccountMenu));
                Vec::new()
            }
            MainChoice::Status => {
                self.enter(Screen::Status);
                vec![Effect::Dispatch(MailCommand::ProbeStatus)]
            }
            MainChoice::Quit => vec![Effect::Quit],
        }
    }

    fn select_mailbox(&mut self, choice: MailboxChoice) -> Vec<Effect> {
        match choice {
            MailboxChoice::Open(kind) => {
                self.enter(Screen::EmailList);
                self.switch_mailbox(kind)
            }
            MailboxChoice::SetUpAccount => {
                self.enter(Screen::AccountWizard(Wizard::new(None)));
                Vec::new()
            }
        }
    }

    fn select_account(&mut self, choice: AccountChoice) -> Vec<Effect> {
        match choice {
            AccountChoice::AddAccount | AccountChoice::EditAccount => {
                let wizard = Wizard::new(self.account.as_ref());
                self.enter(Screen::AccountWizard(wizard));
                Vec::new()
            }
            AccountChoice::Reconnect => {
                self.session = None;
                self.status = Some("Connecting...".to_string());
                self.authenticate()
            }
        }
    }

    /// Discards the current listing and asks for the new mailbox exactly once.
    fn switch_mailbox(&mut self, kind: MailboxKind) -> Vec<Effect> {
        self.mailbox = MailboxView::loading(kind, self.settings.page_size);
        let mut effects = vec![record(AnalyticsAction::MailboxOpened, kind, None)];
        effects.extend(self.request_refresh());
        effects
    }

    fn request_refresh(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.mailbox.loading = true;
        let kind = self.mailbox.kind;
        match &self.session {
            Some(session) => vec![Effect::Dispatch(MailCommand::FetchMailbox {
                generation: self.generation,
                session: session.clone(),
                kind,
                limit: self.settings.fetch_limit,
            })],
            None => {
                self.pending_mailbox = Some(kind);
                self.authenticate()
            }
        }
    }

    fn authenticate(&mut self) -> Vec<Effect> {
        let Some(account) = &self.account else {
            self.mailbox.loading = false;
            self.pending_mailbox = None;
            self.status = Some("No account configured".to_string());
            return Vec::new();
        };
        if self.authenticating {
            return Vec::new();
        }
        self.authenticating = true;
        self.auth_attempt += 1;
        vec![Effect::Dispatch(MailCommand::Authenticate {
            attempt: self.auth_attempt,
            session_url: account.session_url.clone(),
            source: account.credential.clone(),
        })]
    }

    /// Drops the session and routes to the account screen. Nothing retries.
    fn on_auth_lost(&mut self, err: &MailError) -> Vec<Effect> {
        self.session = None;
        self.authenticating = false;
        self.pending_mailbox = None;
        self.mailbox.loading = false;
        self.mailbox.busy.clear();
        self.status = Some(err.to_string());
        self.screen = self.screen_for(ScreenId::AccountMenu);
        Vec::new()
    }

    fn on_key_status(&mut self, key: Key) -> Vec<Effect> {
        if key == Key::Char('r') {
            self.status = Some("Refreshing status...".to_string());
            return vec![Effect::Dispatch(MailCommand::ProbeStatus)];
        }
        Vec::new()
    }

    fn on_key_list(&mut self, key: Key) -> Vec<Effect> {
        let page = self.mailbox.page_size;
        match key {
            Key::Up | Key::Char('k') => self.mailbox.move_up(),
            Key::Down | Key::Char('j') => self.mailbox.move_down(),
            Key::Home | Key::Char('g') => self.mailbox.jump_top(),
            Key::End | Key::Char('G') => self.mailbox.jump_bottom(),
            Key::PageDown => self.mailbox.set_cursor(self.mailbox.cursor + page),
            Key::PageUp => self.mailbox.set_cursor(self.mailbox.cursor.saturating_sub(page)),
            Key::Enter | Key::Right | Key::Char('l') => return self.open_selected(),
            Key::Char('r') => return self.request_refresh(),
            Key::Char('m') => return self.switch_mailbox(self.mailbox.kind.next()),
            Key::Char('d') => return self.guard_selected(true),
            Key::Char('b') => return self.guard_selected(false),
            Key::Char('s') => return self.speak_selected(),
            Key::Char(ch) => {
                if let Some(page) = page_shortcut(ch) {
                    self.mailbox.jump_page(page);
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn open_selected(&mut self) -> Vec<Effect> {
        let Some(summary) = self.mailbox.selected().cloned() else {
            return Vec::new();
        };
        let Some(session) = self.session.clone() else {
            self.status = Some("Not connected; use Account > Connect".to_string());
            return Vec::new();
        };
        self.enter(Screen::EmailDetail(DetailView::loading(summary.id.clone())));
        vec![
            Effect::Dispatch(MailCommand::FetchMessage {
                session,
                id: summary.id.clone(),
            }),
            record(AnalyticsAction::EmailViewed, self.mailbox.kind, Some(&summary)),
        ]
    }

    /// `d` and `b`: both go through the backup guard; only `d` deletes.
    fn guard_selected(&mut self, delete: bool) -> Vec<Effect> {
        let Some(summary) = self.mailbox.selected().cloned() else {
            return Vec::new();
        };
        if self.mailbox.busy.contains(&summary.id) {
            self.status = Some("Already working on this message".to_string());
            return Vec::new();
        }
        let Some(session) = self.session.clone() else {
            self.status = Some("Not connected; use Account > Connect".to_string());
            return Vec::new();
        };
        self.mailbox.busy.insert(summary.id.clone());
        let kind = self.mailbox.kind;
        let command = if delete {
            self.status = Some("Backing up, then deleting...".to_string());
            MailCommand::DeleteEmail {
                session,
                kind,
                summary,
            }
        } else {
            self.status = Some("Backing up...".to_string());
            MailCommand::BackupEmail {
                session,
                kind,
                summary,
            }
        };
        vec![Effect::Dispatch(command)]
    }

    fn speak_selected(&mut self) -> Vec<Effect> {
        if !self.settings.speech {
            self.status = Some("No speech command configured".to_string());
            return Vec::new();
        }
        match self.mailbox.selected() {
            Some(summary) => vec![Effect::Dispatch(MailCommand::Speak {
                text: format!("From {}: {}", summary.sender_display, summary.subject),
            })],
            None => Vec::new(),
        }
    }

    fn on_key_detail(&mut self, key: Key) -> Vec<Effect> {
        if key == Key::Char('s') {
            return self.speak_selected();
        }
        if let Screen::EmailDetail(view) = &mut self.screen {
            match key {
                Key::Up | Key::Char('k') => view.scroll = view.scroll.saturating_sub(1),
                Key::Down | Key::Char('j') => view.scroll = view.scroll.saturating_add(1),
                Key::PageUp => view.scroll = view.scroll.saturating_sub(DETAIL_PAGE),
                Key::PageDown | Key::Char(' ') => {
                    view.scroll = view.scroll.saturating_add(DETAIL_PAGE)
                }
                Key::Home | Key::Char('g') => view.scroll = 0,
                _ => {}
            }
        }
        Vec::new()
    }

    fn on_key_wizard(&mut self, key: Key) -> Vec<Effect> {
        if key == Key::Esc {
            self.status = Some("Account setup cancelled".to_string());
            return self.go_back();
        }
        let step = match &mut self.screen {
            Screen::AccountWizard(wizard) => match key {
                Key::Backspace => {
                    wizard.pop_char();
                    None
                }
                Key::Char(ch) => {
                    wizard.push_char(ch);
                    None
                }
                Key::Enter | Key::Tab => Some(wizard.commit()),
                _ => None,
            },
            _ => None,
        };
        let Some(WizardStep::Done(account)) = step else {
            return Vec::new();
        };
        // New credentials: forget the old session and anything in flight for it.
        self.session = None;
        self.authenticating = false;
        self.auth_attempt += 1;
        self.pending_mailbox = None;
        self.generation += 1;
        self.mailbox = MailboxView::new(MailboxKind::Inbox, self.settings.page_size);
        self.account = Some(account.clone());
        self.status = Some(format!("Saved account {}", account.name));
        self.screen = self.screen_for(ScreenId::AccountMenu);
        vec![Effect::SaveAccount(account)]
    }

    fn on_mail_event(&mut self, event: MailEvent) -> Vec<Effect> {
        match event {
            MailEvent::Authenticated { attempt, result } => {
                if attempt != self.auth_attempt {
                    debug!(attempt, current = self.auth_attempt, "dropping stale sign-in");
                    return Vec::new();
                }
                self.authenticating = false;
                match result {
                    Ok(session) => {
                        let who = session
                            .username
                            .clone()
                            .unwrap_or_else(|| session.account_id.clone());
                        self.session = Some(session);
                        match self.pending_mailbox.take() {
                            Some(kind) if kind == self.mailbox.kind => self.request_refresh(),
                            _ => {
                                self.status = Some(format!("Connected as {}", who));
                                Vec::new()
                            }
                        }
                    }
                    Err(err) => self.on_auth_lost(&err),
                }
            }
            MailEvent::MailboxFetched {
                generation,
                kind,
                result,
            } => {
                if generation != self.generation || kind != self.mailbox.kind {
                    let current = self.generation;
                    debug!(generation, current, mailbox = %kind, "dropping stale fetch");
                    return Vec::new();
                }
                match result {
                    Ok(items) => {
                        self.mailbox.replace(items);
                        Vec::new()
                    }
                    Err(err) if err.is_auth() => self.on_auth_lost(&err),
                    Err(err) => {
                        self.mailbox.loading = false;
                        self.status = Some(err.to_string());
                        Vec::new()
                    }
                }
            }
            MailEvent::MessageFetched { id, result } => {
                if let Err(err) = &result {
                    if err.is_auth() {
                        return self.on_auth_lost(err);
                    }
                }
                match &mut self.screen {
                    Screen::EmailDetail(view) if view.id == id => match result {
                        Ok(message) => view.message = Some(message),
                        Err(err) => view.error = Some(err.to_string()),
                    },
                    _ => debug!(id = %id, "message arrived after leaving the detail view"),
                }
                Vec::new()
            }
            MailEvent::EmailDeleted { id, kind, result } => {
                let current = kind == self.mailbox.kind;
                if current {
                    self.mailbox.busy.remove(&id);
                }
                match result {
                    Ok(receipt) => {
                        let summary = current
                            .then(|| self.mailbox.items.iter().find(|s| s.id == id).cloned())
                            .flatten();
                        if current {
                            self.mailbox.remove(&id);
                        }
                        self.status = Some(format!(
                            "Deleted; backup at {}",
                            receipt.path.display()
                        ));
                        vec![record(AnalyticsAction::EmailDeleted, kind, summary.as_ref())]
                    }
                    Err(err) if err.is_auth() => self.on_auth_lost(&err),
                    // A timeout or dropped connection may land after the server destroyed it.
                    Err(err @ MailError::Network(_)) => {
                        let note = format!("Delete outcome unknown, any backup is kept: {}", err);
                        self.status = Some(note);
                        if current {
                            self.request_refresh()
                        } else {
                            Vec::new()
                        }
                    }
                    Err(err) => {
                        self.status = Some(format!("Delete aborted, message kept: {}", err));
                        Vec::new()
                    }
                }
            }
            MailEvent::EmailBackedUp { id, kind, result } => {
                if kind == self.mailbox.kind {
                    self.mailbox.busy.remove(&id);
                }
                match result {
                    Ok(receipt) => {
                        let summary = self.mailbox.items.iter().find(|s| s.id == id).cloned();
                        self.status = Some(format!("Backed up to {}", receipt.path.display()));
                        vec![record(AnalyticsAction::EmailBackedUp, kind, summary.as_ref())]
                    }
                    Err(err) if err.is_auth() => self.on_auth_lost(&err),
                    Err(err) => {
                        self.status = Some(format!("Backup failed: {}", err));
                        Vec::new()
                    }
                }
            }
            MailEvent::StatusProbed { name, result } => {
                let line = result.map_err(|err| err.to_string());
                match self.probes.iter_mut().find(|(probe, _)| *probe == name) {
                    Some(slot) => slot.1 = line,
                    None => self.probes.push((name, line)),
                }
                Vec::new()
            }
            MailEvent::Spoken(result) => {
                if let Err(err) = result {
                    self.status = Some(format!("Speech failed: {}", err));
                }
                Vec::new()
            }
        }
    }
}
