use std::collections::HashSet;

use mailroom_core::{EmailSummary, MailboxKind};

/// The one active mailbox listing. `cursor` is always a valid index into
/// `items`, or 0 when there are none.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MailboxView {
    pub(crate) kind: MailboxKind,
    pub(crate) items: Vec<EmailSummary>,
    pub(crate) loading: bool,
    pub(crate) page_index: usize,
    pub(crate) cursor: usize,
    pub(crate) page_size: usize,
    /// Ids with a delete or backup in flight.
    pub(crate) busy: HashSet<String>,
}

impl MailboxView {
    pub(crate) fn new(kind: MailboxKind, page_size: usize) -> Self {
        Self {
            kind,
            items: Vec::new(),
            loading: false,
            page_index: 0,
            cursor: 0,
            page_size: page_size.max(1),
            busy: HashSet::new(),
        }
    }

    /// Fresh view for `kind` waiting on its first fetch.
    pub(crate) fn loading(kind: MailboxKind, page_size: usize) -> Self {
        Self {
            loading: true,
            ..Self::new(kind, page_size)
        }
    }

    pub(crate) fn selected(&self) -> Option<&EmailSummary> {
        self.items.get(self.cursor)
    }

    pub(crate) fn page_count(&self) -> usize {
        self.items.len().div_ceil(self.page_size).max(1)
    }

    pub(crate) fn replace(&mut self, items: Vec<EmailSummary>) {
        self.items = items;
        self.loading = false;
        self.busy.retain(|id| self.items.iter().any(|item| &item.id == id));
        self.set_cursor(self.cursor);
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        self.busy.remove(id);
        let Some(pos) = self.items.iter().position(|item| item.id == id) else {
            return false;
        };
        self.items.remove(pos);
        let cursor = if pos < self.cursor {
            self.cursor - 1
        } else {
            self.cursor
        };
        self.set_cursor(cursor);
        true
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.items.len().saturating_sub(1));
        self.page_index = self.cursor / self.page_size;
    }

    pub(crate) fn move_down(&mut self) {
        self.set_cursor(self.cursor.saturating_add(1));
    }

    pub(crate) fn move_up(&mut self) {
        self.set_cursor(self.cursor.saturating_sub(1));
    }

    pub(crate) fn jump_top(&mut self) {
        self.set_cursor(0);
    }

    pub(crate) fn jump_bottom(&mut self) {
        self.set_cursor(self.items.len().saturating_sub(1));
    }

    /// Zero-based page; past-the-end pages land on the last item.
    pub(crate) fn jump_page(&mut self, page: usize) {
        self.set_cursor(page.saturating_mul(self.page_size));
    }
}
