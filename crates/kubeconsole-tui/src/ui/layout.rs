use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Layout helper for the console screen
pub struct Layout;

impl Layout {
    /// Header, optional search bar, records and status bar
    ///
    /// Returns (header, search, content, status).
    pub fn console(area: Rect, show_search: bool) -> (Rect, Option<Rect>, Rect, Rect) {
        let search_height = if show_search { 3 } else { 0 };
        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),             // Header
                Constraint::Length(search_height), // Search bar
                Constraint::Min(1),                // Records
                Constraint::Length(1),             // Status bar
            ])
            .split(area);

        let search = show_search.then_some(chunks[1]);
        (chunks[0], search, chunks[2], chunks[3])
    }

    /// Centered popup of at most `width` x `height`
    pub fn popup(area: Rect, width: u16, height: u16) -> Rect {
        let width = width.min(area.width.saturating_sub(4));
        let height = height.min(area.height.saturating_sub(4));
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_layout() {
        let area = Rect::new(0, 0, 80, 24);
        let (header, search, content, status) = Layout::console(area, true);
        assert_eq!(header.height, 3);
        assert_eq!(search.map(|r| r.height), Some(3));
        assert_eq!(content.height, 17);
        assert_eq!(status.y, 23);

        let (_, search, content, _) = Layout::console(area, false);
        assert!(search.is_none());
        assert_eq!(content.height, 20);
    }

    #[test]
    fn test_popup_is_centered() {
        let popup = Layout::popup(Rect::new(0, 0, 100, 40), 50, 20);
        assert_eq!(popup, Rect::new(25, 10, 50, 20));

        let small = Layout::popup(Rect::new(0, 0, 20, 10), 50, 20);
        assert_eq!(small, Rect::new(2, 2, 16, 6));
    }
}
