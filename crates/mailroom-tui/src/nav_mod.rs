//! Screens, their typed choices and the per-screen cursor memory used when
//! navigating back.

use std::collections::HashMap;

use mailroom_core::{FullMessage, MailboxKind};

use crate::wizard_mod::Wizard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ScreenId {
    MainMenu,
    MailboxMenu,
    AccountMenu,
    Status,
    EmailList,
    EmailDetail,
    AccountWizard,
}

impl ScreenId {
    /// Every screen except the root has exactly one parent.
    pub(crate) fn parent(self) -> Option<ScreenId> {
        match self {
            ScreenId::MainMenu => None,
            ScreenId::MailboxMenu | ScreenId::AccountMenu | ScreenId::Status => {
                Some(ScreenId::MainMenu)
            }
            ScreenId::EmailList => Some(ScreenId::MailboxMenu),
            ScreenId::EmailDetail => Some(ScreenId::EmailList),
            ScreenId::AccountWizard => Some(ScreenId::AccountMenu),
        }
    }

    pub(crate) fn title(self) -> &'static str {
        match self {
            ScreenId::MainMenu => "Main menu",
            ScreenId::MailboxMenu => "Mailboxes",
            ScreenId::AccountMenu => "Account",
            ScreenId::Status => "Status",
            ScreenId::EmailList => "Messages",
            ScreenId::EmailDetail => "Message",
            ScreenId::AccountWizard => "Account setup",
        }
    }
}

pub(crate) trait Choice: Copy {
    fn label(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MainChoice {
    ReadEmails,
    Account,
    Status,
    Quit,
}

impl MainChoice {
    pub(crate) fn all() -> Vec<MainChoice> {
        vec![
            MainChoice::ReadEmails,
            MainChoice::Account,
            MainChoice::Status,
            MainChoice::Quit,
        ]
    }
}

impl Choice for MainChoice {
    fn label(&self) -> String {
        match self {
            MainChoice::ReadEmails => "Read emails",
            MainChoice::Account => "Account",
            MainChoice::Status => "System status",
            MainChoice::Quit => "Quit",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MailboxChoice {
    Open(MailboxKind),
    SetUpAccount,
}

impl MailboxChoice {
    pub(crate) fn for_account(configured: bool) -> Vec<MailboxChoice> {
        if configured {
            MailboxKind::ALL.into_iter().map(MailboxChoice::Open).collect()
        } else {
            vec![MailboxChoice::SetUpAccount]
        }
    }
}

impl Choice for MailboxChoice {
    fn label(&self) -> String {
        match self {
            MailboxChoice::Open(kind) => kind.label().to_string(),
            MailboxChoice::SetUpAccount => "No account yet: set one up".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AccountChoice {
    AddAccount,
    EditAccount,
    Reconnect,
}

impl AccountChoice {
    pub(crate) fn for_account(configured: bool) -> Vec<AccountChoice> {
        if configured {
            vec![AccountChoice::Reconnect, AccountChoice::EditAccount]
        } else {
            vec![AccountChoice::AddAccount]
        }
    }
}

impl Choice for AccountChoice {
    fn label(&self) -> String {
        match self {
            AccountChoice::AddAccount => "Add account",
            AccountChoice::EditAccount => "Replace account",
            AccountChoice::Reconnect => "Connect / test connection",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Menu<C> {
    pub(crate) choices: Vec<C>,
    pub(crate) cursor: usize,
}

impl<C: Choice> Menu<C> {
    pub(crate) fn new(choices: Vec<C>, cursor: usize) -> Self {
        let cursor = cursor.min(choices.len().saturating_sub(1));
        Self { choices, cursor }
    }

    pub(crate) fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub(crate) fn move_down(&mut self) {
        if self.cursor + 1 < self.choices.len() {
            self.cursor += 1;
        }
    }

    pub(crate) fn selected(&self) -> Option<C> {
        self.choices.get(self.cursor).copied()
    }

    pub(crate) fn labels(&self) -> Vec<String> {
        self.choices.iter().map(Choice::label).collect()
    }
}

/// The detail screen owns the full message only while it is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DetailView {
    pub(crate) id: String,
    pub(crate) message: Option<FullMessage>,
    pub(crate) error: Option<String>,
    pub(crate) scroll: u16,
}

impl DetailView {
    pub(crate) fn loading(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: None,
            error: None,
            scroll: 0,
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.message.is_none() && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Screen {
    MainMenu(Menu<MainChoice>),
    MailboxMenu(Menu<MailboxChoice>),
    AccountMenu(Menu<AccountChoice>),
    Status,
    EmailList,
    EmailDetail(DetailView),
    AccountWizard(Wizard),
}

impl Screen {
    pub(crate) fn id(&self) -> ScreenId {
        match self {
            Screen::MainMenu(_) => ScreenId::MainMenu,
            Screen::MailboxMenu(_) => ScreenId::MailboxMenu,
            Screen::AccountMenu(_) => ScreenId::AccountMenu,
            Screen::Status => ScreenId::Status,
            Screen::EmailList => ScreenId::EmailList,
            Screen::EmailDetail(_) => ScreenId::EmailDetail,
            Screen::AccountWizard(_) => ScreenId::AccountWizard,
        }
    }

    /// Cursor worth remembering when a child screen is entered. The email
    /// list keeps its cursor in the mailbox view instead.
    pub(crate) fn menu_cursor(&self) -> Option<usize> {
        match self {
            Screen::MainMenu(menu) => Some(menu.cursor),
            Screen::MailboxMenu(menu) => Some(menu.cursor),
            Screen::AccountMenu(menu) => Some(menu.cursor),
            _ => None,
        }
    }
}

/// Saved cursor per menu screen, restored verbatim on back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NavMemory {
    saved: HashMap<ScreenId, usize>,
}

impl NavMemory {
    pub(crate) fn remember(&mut self, screen: &Screen) {
        if let Some(cursor) = screen.menu_cursor() {
            self.saved.insert(screen.id(), cursor);
        }
    }

    pub(crate) fn recall(&self, id: ScreenId) -> usize {
        self.saved.get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use mailroom_core::MailboxKind;

    use super::{
        AccountChoice, MailboxChoice, MainChoice, Menu, NavMemory, Screen, ScreenId,
    };

    #[test]
    fn every_screen_but_the_root_reaches_the_root() {
        let all = [
            ScreenId::MailboxMenu,
            ScreenId::AccountMenu,
            ScreenId::Status,
            ScreenId::EmailList,
            ScreenId::EmailDetail,
            ScreenId::AccountWizard,
        ];
        for id in all {
            let mut current = id;
            let mut hops = 0;
            while let Some(parent) = current.parent() {
                current = parent;
                hops += 1;
                assert!(hops < 5);
            }
            assert_eq!(current, ScreenId::MainMenu);
        }
        assert_eq!(ScreenId::MainMenu.parent(), None);
    }

    #[test]
    fn menus_depend_on_account_presence() {
        assert_eq!(MailboxChoice::for_account(false), vec![MailboxChoice::SetUpAccount]);
        assert_eq!(
            MailboxChoice::for_account(true)[1],
            MailboxChoice::Open(MailboxKind::Spam)
        );
        assert_eq!(AccountChoice::for_account(false), vec![AccountChoice::AddAccount]);
    }

    #[test]
    fn menu_cursor_is_clamped() {
        let mut menu = Menu::new(MainChoice::all(), 99);
        assert_eq!(menu.cursor, 3);
        menu.move_down();
        assert_eq!(menu.selected(), Some(MainChoice::Quit));
        for _ in 0..10 {
            menu.move_up();
        }
        assert_eq!(menu.selected(), Some(MainChoice::ReadEmails));
    }

    #[test]
    fn memory_keeps_menu_cursors_only() {
        let mut memory = NavMemory::default();
        memory.remember(&Screen::MainMenu(Menu::new(MainChoice::all(), 2)));
        memory.remember(&Screen::EmailList);
        assert_eq!(memory.recall(ScreenId::MainMenu), 2);
        assert_eq!(memory.recall(ScreenId::EmailList), 0);
    }
}
