/// Half-open `[start, end)` slice of a list that fits on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl Window {
    pub(crate) fn len(&self) -> usize {
        self.end - self.start
    }

    pub(crate) fn above(&self) -> usize {
        self.start
    }

    pub(crate) fn below(&self, total: usize) -> usize {
        total.saturating_sub(self.end)
    }
}

/// Sticks to the top or bottom edge while the cursor is within a quarter
/// page of it, otherwise keeps the cursor centred.
pub(crate) fn visible_window(total: usize, capacity: usize, cursor: usize) -> Window {
    if total <= capacity {
        return Window { start: 0, end: total };
    }
    let margin = (capacity + 2) / 4;
    let last_start = total - capacity;
    let start = if cursor < margin {
        0
    } else if cursor >= total - margin {
        last_start
    } else {
        cursor.saturating_sub(capacity / 2).min(last_start)
    };
    Window {
        start,
        end: start + capacity,
    }
}
