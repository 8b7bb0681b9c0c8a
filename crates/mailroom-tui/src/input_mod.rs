use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Terminal-independent keys the reducer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
    Tab,
    Backspace,
    PageUp,
    PageDown,
    Home,
    End,
    Char(char),
    Interrupt,
}

pub(crate) fn translate_key(event: KeyEvent) -> Option<Key> {
    if event.kind == KeyEventKind::Release {
        return None;
    }
    let key = match (event.code, event.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Key::Interrupt,
        (KeyCode::Up, _) => Key::Up,
        (KeyCode::Down, _) => Key::Down,
        (KeyCode::Left, _) => Key::Left,
        (KeyCode::Right, _) => Key::Right,
        (KeyCode::Enter, _) => Key::Enter,
        (KeyCode::Esc, _) => Key::Esc,
        (KeyCode::Tab, _) => Key::Tab,
        (KeyCode::Backspace, _) => Key::Backspace,
        (KeyCode::PageUp, _) => Key::PageUp,
        (KeyCode::PageDown, _) => Key::PageDown,
        (KeyCode::Home, _) => Key::Home,
        (KeyCode::End, _) => Key::End,
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            Key::Char(ch)
        }
        _ => return None,
    };
    Some(key)
}

const SHIFTED_DIGITS: [char; 10] = ['!', '@', '#', '$', '%', '^', '&', '*', '(', ')'];

/// Zero-based page for a page-jump key. `1`..`9` are pages 0..8 and `0` is
/// page 9; the shifted row (US layout) continues with pages 10..19.
pub(crate) fn page_shortcut(ch: char) -> Option<usize> {
    if let Some(digit) = ch.to_digit(10) {
        let digit = digit as usize;
        return Some(if digit == 0 { 9 } else { digit - 1 });
    }
    SHIFTED_DIGITS
        .iter()
        .position(|candidate| *candidate == ch)
        .map(|idx| 10 + idx)
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

    use super::{Key, page_shortcut, translate_key};

    #[test]
    fn digits_and_shift_digits_map_to_pages() {
        assert_eq!(page_shortcut('1'), Some(0));
        assert_eq!(page_shortcut('9'), Some(8));
        assert_eq!(page_shortcut('0'), Some(9));
        assert_eq!(page_shortcut('!'), Some(10));
        assert_eq!(page_shortcut(')'), Some(19));
        assert_eq!(page_shortcut('x'), None);
    }

    #[test]
    fn control_c_interrupts_and_releases_are_ignored() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(translate_key(ctrl_c), Some(Key::Interrupt));

        let mut release = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(translate_key(release), None);

        let shifted = KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(translate_key(shifted), Some(Key::Char('G')));
    }
}
