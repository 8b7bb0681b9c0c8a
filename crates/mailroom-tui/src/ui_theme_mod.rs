use ratatui::style::{Color, Modifier, Style};
use tracing::warn;

#[derive(Debug, Clone)]
pub(crate) struct UiTheme {
    pub(crate) base: Style,
    pub(crate) border: Style,
    pub(crate) bar: Style,
    pub(crate) show_bars: bool,
    pub(crate) title: Style,
    pub(crate) focus: Style,
    pub(crate) unread: Style,
    pub(crate) table_header: Style,
    pub(crate) label: Style,
    pub(crate) muted: Style,
    pub(crate) warn: Style,
    pub(crate) error: Style,
}

impl UiTheme {
    pub(crate) fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Self::default_theme(),
            "nord" => Self::nord(),
            "gruvbox" => Self::gruvbox(),
            "dracula" => Self::dracula(),
            other => {
                warn!(theme = other, "unknown ui theme, using default");
                Self::default_theme()
            }
        }
    }

    pub(crate) fn default_theme() -> Self {
        Self {
            base: Style::default(),
            border: Style::default(),
            bar: Style::default(),
            show_bars: true,
            title: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            focus: Style::default().bg(Color::DarkGray).fg(Color::Yellow),
            unread: Style::default().add_modifier(Modifier::BOLD),
            table_header: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::Gray),
            muted: Style::default().fg(Color::DarkGray),
            warn: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::LightRed),
        }
    }

    pub(crate) fn nord() -> Self {
        let nord0 = Color::Rgb(46, 52, 64);
        let nord2 = Color::Rgb(67, 76, 94);
        let nord3 = Color::Rgb(76, 86, 106);
        let nord4 = Color::Rgb(216, 222, 233);
        let nord6 = Color::Rgb(236, 239, 244);
        let nord8 = Color::Rgb(136, 192, 208);
        let nord11 = Color::Rgb(191, 97, 106);
        let nord13 = Color::Rgb(235, 203, 139);
        Self {
            base: Style::default().fg(nord6).bg(nord0),
            border: Style::default().fg(nord4),
            bar: Style::default().fg(nord6).bg(nord2),
            show_bars: false,
            title: Style::default().fg(nord8).add_modifier(Modifier::BOLD),
            focus: Style::default().fg(nord8).bg(nord2),
            unread: Style::default().fg(nord6).add_modifier(Modifier::BOLD),
            table_header: Style::default().fg(nord6).add_modifier(Modifier::BOLD),
            label: Style::default().fg(nord4),
            muted: Style::default().fg(nord3),
            warn: Style::default().fg(nord13),
            error: Style::default().fg(nord11),
        }
    }

    pub(crate) fn gruvbox() -> Self {
        let bg = Color::Rgb(40, 40, 40);
        let bg_alt = Color::Rgb(60, 56, 54);
        let fg = Color::Rgb(235, 219, 178);
        let border = Color::Rgb(146, 131, 116);
        let accent = Color::Rgb(131, 165, 152);
        let warn = Color::Rgb(250, 189, 47);
        let err = Color::Rgb(204, 36, 29);
        Self {
            base: Style::default().fg(fg).bg(bg),
            border: Style::default().fg(border),
            bar: Style::default().fg(fg).bg(bg_alt),
            show_bars: false,
            title: Style::default().fg(accent).add_modifier(Modifier::BOLD),
            focus: Style::default().fg(warn).bg(bg_alt),
            unread: Style::default().fg(fg).add_modifier(Modifier::BOLD),
            table_header: Style::default().fg(fg).add_modifier(Modifier::BOLD),
            label: Style::default().fg(border),
            muted: Style::default().fg(border),
            warn: Style::default().fg(warn),
            error: Style::default().fg(err),
        }
    }

    pub(crate) fn dracula() -> Self {
        let bg = Color::Rgb(40, 42, 54);
        let current = Color::Rgb(68, 71, 90);
        let fg = Color::Rgb(248, 248, 242);
        let comment = Color::Rgb(98, 114, 164);
        let purple = Color::Rgb(189, 147, 249);
        let yellow = Color::Rgb(241, 250, 140);
        let red = Color::Rgb(255, 85, 85);
        Self {
            base: Style::default().fg(fg).bg(bg),
            border: Style::default().fg(comment),
            bar: Style::default().fg(fg).bg(current),
            show_bars: false,
            title: Style::default().fg(purple).add_modifier(Modifier::BOLD),
            focus: Style::default().fg(purple).bg(current),
            unread: Style::default().fg(fg).add_modifier(Modifier::BOLD),
            table_header: Style::default().fg(fg).add_modifier(Modifier::BOLD),
            label: Style::default().fg(comment),
            muted: Style::default().fg(comment),
            warn: Style::default().fg(yellow),
            error: Style::default().fg(red),
        }
    }
}

#[cfg(test)]
mod tests {
    use ratatui::style::Color;

    use super::UiTheme;

    #[test]
    fn names_are_case_insensitive_and_unknown_falls_back() {
        assert!(!UiTheme::from_name(" Nord ").show_bars);
        assert_eq!(UiTheme::from_name("gruvbox").error.fg, Some(Color::Rgb(204, 36, 29)));
        assert!(UiTheme::from_name("no-such-theme").show_bars);
    }
}
