use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table, Wrap},
};
use unicode_width::{UnicodeWidthChar as _, UnicodeWidthStr as _};

use super::App;
use crate::nav_mod::{DetailView, Screen};
use crate::ui_theme_mod::UiTheme;
use crate::window_mod::visible_window;
use crate::wizard_mod::{Wizard, WizardField};

pub(crate) fn ui(frame: &mut ratatui::Frame, app: &App, theme: &UiTheme) {
    let area = frame.area();
    frame.render_widget(Block::default().style(theme.base), area);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(area);

    render_status_bar(frame, layout[0], app, theme);
    match &app.screen {
        Screen::MainMenu(menu) => {
            render_menu(frame, layout[1], app, &menu.labels(), menu.cursor, theme)
        }
        Screen::MailboxMenu(menu) => {
            render_menu(frame, layout[1], app, &menu.labels(), menu.cursor, theme)
        }
        Screen::AccountMenu(menu) => {
            render_menu(frame, layout[1], app, &menu.labels(), menu.cursor, theme)
        }
        Screen::Status => render_status(frame, layout[1], app, theme),
        Screen::EmailList => render_email_list(frame, layout[1], app, theme),
        Screen::EmailDetail(view) => render_detail(frame, layout[1], view, theme),
        Screen::AccountWizard(wizard) => render_wizard(frame, layout[1], wizard, theme),
    }
    render_help_bar(frame, layout[2], app, theme);
}

fn render_status_bar(frame: &mut ratatui::Frame, area: Rect, app: &App, theme: &UiTheme) {
    let mut spans = vec![Span::styled(" mailroom ", theme.title)];
    let account = app
        .account
        .as_ref()
        .map(|a| a.name.as_str())
        .unwrap_or("no account");
    let link = if app.session.is_some() { "online" } else { "offline" };
    spans.push(Span::raw(format!(" acct: {} ({}) ", account, link)));
    spans.push(Span::styled(format!(" {} ", app.screen.id().title()), theme.label));
    if app.is_busy() {
        spans.push(Span::styled(format!(" {} ", app.spinner_frame()), theme.warn));
    }
    if let Some(msg) = &app.status {
        spans.push(Span::styled(format!(" | {}", msg), theme.warn));
    }
    let block = Block::default()
        .borders(if theme.show_bars {
            Borders::BOTTOM
        } else {
            Borders::NONE
        })
        .style(theme.bar)
        .border_style(theme.border);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(theme.bar).block(block),
        area,
    );
}

fn render_menu(
    frame: &mut ratatui::Frame,
    area: Rect,
    app: &App,
    labels: &[String],
    cursor: usize,
    theme: &UiTheme,
) {
    let lines: Vec<Line> = labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            if idx == cursor {
                Line::from(Span::styled(format!("> {}", label), theme.focus))
            } else {
                Line::from(Span::raw(format!("  {}", label)))
            }
        })
        .collect();
    let block = Block::default()
        .borders(Borders::NONE)
        .title(Span::styled(app.screen.id().title(), theme.title))
        .style(theme.base);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status(frame: &mut ratatui::Frame, area: Rect, app: &App, theme: &UiTheme) {
    let mut lines = Vec::new();
    if app.probes.is_empty() {
        lines.push(Line::from(Span::styled(
            "No [[status]] probes reported yet",
            theme.muted,
        )));
    }
    for (name, result) in &app.probes {
        let value = match result {
            Ok(text) => Span::raw(text.clone()),
            Err(err) => Span::styled(err.clone(), theme.error),
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<12}", name), theme.label),
            value,
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(format!("{:<12}", "backups"), theme.label),
        Span::raw(app.settings.backup_dir.display().to_string()),
    ]));
    lines.push(Line::from(vec![
        Span::styled(format!("{:<12}", "log"), theme.label),
        Span::raw(app.settings.log_path.display().to_string()),
    ]));
    let block = Block::default()
        .title(Span::styled("System status", theme.title))
        .style(theme.base);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_email_list(frame: &mut ratatui::Frame, area: Rect, app: &App, theme: &UiTheme) {
    let view = &app.mailbox;
    let title = format!(
        "{} ({})  page {}/{}",
        view.kind.label(),
        view.items.len(),
        view.page_index + 1,
        view.page_count()
    );
    let block = Block::default()
        .title(Span::styled(title, theme.title))
        .style(theme.base);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if view.items.is_empty() {
        let msg = if view.loading {
            "Loading..."
        } else {
            "No messages"
        };
        frame.render_widget(Paragraph::new(msg).style(theme.muted), inner);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(inner);
    // The table spends one row on its header.
    let rows_visible = (chunks[1].height.saturating_sub(1) as usize).max(1);
    let capacity = rows_visible.min(view.page_size);
    let window = visible_window(view.items.len(), capacity, view.cursor);

    if window.above() > 0 {
        let text = format!("↑ {} more above", window.above());
        frame.render_widget(Paragraph::new(text).style(theme.muted), chunks[0]);
    }

    let from_width = 24;
    let rows: Vec<Row> = view.items[window.start..window.end]
        .iter()
        .enumerate()
        .map(|(offset, summary)| {
            let idx = window.start + offset;
            let marker = if view.busy.contains(&summary.id) {
                "~"
            } else if summary.is_unread {
                "*"
            } else {
                " "
            };
            let mut style = if idx == view.cursor {
                theme.focus
            } else {
                Style::default()
            };
            if summary.is_unread {
                style = style.patch(theme.unread);
            }
            let subject = match &summary.alias_recipient {
                Some(alias) => format!("{}  [{}]", summary.subject, alias),
                None => summary.subject.clone(),
            };
            Row::new(vec![
                marker.to_string(),
                summary
                    .received_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                fit_width(&summary.sender_display, from_width),
                subject,
            ])
            .style(style)
        })
        .collect();
    let header = Row::new(vec!["", "Received", "From", "Subject"]).style(theme.table_header);
    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Length(16),
            Constraint::Length(from_width as u16),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .column_spacing(1)
    .style(theme.base);
    frame.render_widget(table, chunks[1]);

    let below = window.below(view.items.len());
    if below > 0 {
        let text = format!("↓ {} more below", below);
        frame.render_widget(Paragraph::new(text).style(theme.muted), chunks[2]);
    }
}

fn render_detail(frame: &mut ratatui::Frame, area: Rect, view: &DetailView, theme: &UiTheme) {
    let block = Block::default()
        .title(Span::styled("Message", theme.title))
        .style(theme.base);
    let Some(message) = &view.message else {
        let (text, style) = match &view.error {
            Some(err) => (err.clone(), theme.error),
            None => ("Loading...".to_string(), theme.muted),
        };
        frame.render_widget(Paragraph::new(text).style(style).block(block), area);
        return;
    };

    let header = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<9}", label), theme.label),
            Span::raw(value),
        ])
    };
    let mut lines = vec![
        header("From:", message.sender_line()),
        header("To:", message.recipient_line()),
    ];
    if !message.cc.is_empty() {
        let cc = message
            .cc
            .iter()
            .map(|addr| addr.full())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(header("Cc:", cc));
    }
    lines.push(header(
        "Date:",
        message
            .received_at
            .with_timezone(&Local)
            .format("%a, %d %b %Y %H:%M")
            .to_string(),
    ));
    lines.push(header("Subject:", message.subject.clone()));
    for attachment in &message.attachments {
        let name = attachment.name.as_deref().unwrap_or("(unnamed)");
        lines.push(header(
            "Attach:",
            format!("{} ({}, {} bytes)", name, attachment.mime, attachment.size),
        ));
    }
    lines.push(Line::from(""));
    lines.extend(message.text_body.lines().map(|line| Line::from(line.to_string())));

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((view.scroll, 0)),
        area,
    );
}

fn masked(text: &str) -> String {
    "*".repeat(text.chars().count())
}

fn render_wizard(frame: &mut ratatui::Frame, area: Rect, wizard: &Wizard, theme: &UiTheme) {
    let mut lines = Vec::new();
    for (idx, field) in WizardField::ORDER.iter().enumerate() {
        let shown = |text: &str| {
            if field.is_secret() {
                masked(text)
            } else {
                text.to_string()
            }
        };
        let value = if idx < wizard.values.len() {
            shown(&wizard.values[idx])
        } else if idx == wizard.step {
            format!("{}_", shown(&wizard.input))
        } else {
            String::new()
        };
        let label_style = if idx == wizard.step {
            theme.focus
        } else {
            theme.label
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<14}", field.label()), label_style),
            Span::raw(value),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(wizard.hint(), theme.muted)));
    if let Some(err) = &wizard.error {
        lines.push(Line::from(Span::styled(err.clone(), theme.error)));
    }
    let block = Block::default()
        .title(Span::styled("Account setup", theme.title))
        .style(theme.base);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help_bar(frame: &mut ratatui::Frame, area: Rect, app: &App, theme: &UiTheme) {
    let help = match &app.screen {
        Screen::MainMenu(_) => "j/k move  Enter select  q quit",
        Screen::MailboxMenu(_) | Screen::AccountMenu(_) => {
            "j/k move  Enter select  Esc/h back  q quit"
        }
        Screen::Status => "r re-probe  Esc/h back  q quit",
        Screen::EmailList => concat!(
            "j/k move  g/G top/bottom  1-0 !-) page  Enter open  r refresh  ",
            "m mailbox  d delete  b backup  s speak  Esc back"
        ),
        Screen::EmailDetail(_) => "j/k scroll  Space page  s speak  Esc/h back  q quit",
        Screen::AccountWizard(_) => "type value  Enter/Tab next field  Backspace edit  Esc cancel",
    };
    let block = Block::default()
        .borders(if theme.show_bars {
            Borders::TOP
        } else {
            Borders::NONE
        })
        .style(theme.bar)
        .border_style(theme.border);
    frame.render_widget(Paragraph::new(help).style(theme.bar).block(block), area);
}

/// Truncates to `max` terminal columns, ending in an ellipsis when cut.
fn fit_width(text: &str, max: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.width() <= max {
        return flat;
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in flat.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};
    use mailroom_core::{EmailSummary, MailboxKind};
    use ratatui::{Terminal, backend::TestBackend};

    use super::{fit_width, ui};
    use crate::mailbox_mod::MailboxView;
    use crate::nav_mod::Screen;
    use crate::ui_theme_mod::UiTheme;
    use crate::{App, Settings};

    fn app_with(n: usize, cursor: usize) -> App {
        let settings = Settings {
            fetch_limit: 200,
            page_size: 40,
            speech: false,
            backup_dir: PathBuf::from("/tmp/b"),
            log_path: PathBuf::from("/tmp/l"),
        };
        let mut app = App::new(settings, None);
        let mut view = MailboxView::new(MailboxKind::Inbox, 40);
        view.replace(
            (0..n)
                .map(|i| EmailSummary {
                    id: format!("m{}", i),
                    subject: format!("Subject {}", i),
                    sender_display: "Ann".to_string(),
                    recipient_display: "me@example.com".to_string(),
                    alias_recipient: None,
                    received_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
                    preview_text: String::new(),
                    is_unread: false,
                })
                .collect(),
        );
        view.set_cursor(cursor);
        app.mailbox = view;
        app.screen = Screen::EmailList;
        app
    }

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|frame| ui(frame, app, &UiTheme::default_theme()))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn long_list_shows_scroll_indicators() {
        let text = screen_text(&app_with(100, 50));
        assert!(text.contains("more above"));
        assert!(text.contains("more below"));
        assert!(text.contains("Subject 50"));
    }

    #[test]
    fn top_of_list_has_nothing_above() {
        let text = screen_text(&app_with(100, 0));
        assert!(!text.contains("more above"));
        assert!(text.contains("more below"));
        assert!(text.contains("Subject 0"));
    }

    #[test]
    fn empty_list_says_so() {
        let text = screen_text(&app_with(0, 0));
        assert!(text.contains("No messages"));
    }

    #[test]
    fn fit_width_respects_wide_characters() {
        assert_eq!(fit_width("short", 10), "short");
        assert_eq!(fit_width("abcdefghij", 5), "abcd…");
        assert_eq!(fit_width("日本語テキスト", 6), "日本…");
    }
}
