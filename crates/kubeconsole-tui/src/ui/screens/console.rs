use chrono::{DateTime, Local};
use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};

use kubeconsole_logs::BufferManager;
use kubeconsole_types::{BufferType, FetchStatus, LogItem, MISSING_DATA_MESSAGE};

use crate::app::AppState;
use crate::ui::components::{HelpOverlay, StatusBar, console_hints};
use crate::ui::{Layout, Theme};

/// Log/event console screen
pub struct ConsoleScreen;

impl ConsoleScreen {
    /// Render the active tab from its buffer
    ///
    /// Only the visible window is read from the buffer. Updates the state's
    /// viewport height for scrolling.
    pub fn render(frame: &mut Frame, state: &mut AppState, buffer: &BufferManager) {
        let show_search = state.search_active || state.search_term.is_some();
        let (header, search, content, status) = Layout::console(frame.area(), show_search);

        Self::render_header(frame, header, state);
        if let Some(area) = search {
            Self::render_search_bar(frame, area, state, buffer);
        }
        Self::render_records(frame, content, state, buffer);
        Self::render_status_bar(frame, status, state, buffer);

        if state.help_visible {
            HelpOverlay::render(frame);
        }
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
        let mut spans = vec![
            Span::styled("kubeconsole", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
        ];
        if let Some(context) = &state.target.context {
            spans.push(Span::styled(context.as_str(), Theme::text()));
            spans.push(Span::styled(" │ ", Theme::text_dim()));
        }
        spans.push(Span::styled(state.target.label(), Theme::text_highlight()));
        spans.push(Span::styled(" │ ", Theme::text_dim()));

        for buffer_type in [BufferType::Logs, BufferType::Events] {
            let fetch_status = state.tab_for(buffer_type).fetch_status;
            let style = if buffer_type == state.active_tab {
                Theme::tab_active()
            } else {
                Theme::tab()
            };
            spans.push(Span::styled(format!(" {} ", buffer_type.label()), style));
            spans.push(Span::styled(
                format!(" ● {} ", fetch_status.as_str()),
                Style::default().fg(fetch_status.color()),
            ));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_search_bar(frame: &mut Frame, area: Rect, state: &AppState, buffer: &BufferManager) {
        let mut spans = vec![];

        if state.search_active {
            spans.push(Span::styled(
                " /",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(state.search_input.as_str(), Theme::text_highlight()));
            spans.push(Span::styled(
                "█",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::SLOW_BLINK),
            ));
            spans.push(Span::styled(
                "  [Enter] Apply  [Esc] Cancel",
                Theme::text_dim(),
            ));
        } else {
            let term = state.search_term.as_deref().unwrap_or_default();
            spans.push(Span::styled(" Term: ", Theme::text_dim()));
            spans.push(Span::styled(term, Theme::text_highlight()));
            spans.push(Span::styled("  ", Theme::text()));

            let position = match state.match_position(buffer) {
                Some((ordinal, total)) => format!("{}/{}", ordinal, total),
                None => format!("{} matches", buffer.num_matches()),
            };
            spans.push(Span::styled(position, Theme::text()));
            spans.push(Span::styled(
                "  [n/N] Next/Prev  [/] Edit  [Esc] Clear",
                Theme::text_dim(),
            ));
        }

        let bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if state.search_active {
                    Style::default().fg(Color::Yellow)
                } else {
                    Theme::border()
                })
                .title(Span::styled(" Search ", Theme::title())),
        );

        frame.render_widget(bar, area);
    }

    fn render_records(frame: &mut Frame, area: Rect, state: &mut AppState, buffer: &BufferManager) {
        let size = buffer.size();
        let inner_height = area.height.saturating_sub(2) as usize;
        state.viewport_height = inner_height.max(1);

        let tab = state.tab();
        let start = tab.visible_start(size, inner_height);
        let end = (start + inner_height).min(size);
        let term = buffer.search_term();

        let lines: Vec<Line> = (start..end)
            .filter_map(|index| {
                let item = buffer.get(index)?;
                Some(record_line(item, term, tab.current_match == Some(index)))
            })
            .collect();

        let follow = if tab.auto_scroll { " ▼" } else { "" };
        let title = format!(" {} ({}){} ", state.active_tab.label(), size, follow);

        let records = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border_focused())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(records, area);

        if size > inner_height {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));

            let max_scroll = size - inner_height;
            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(start);

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, buffer: &BufferManager) {
        let paused = state.tab().fetch_status == FetchStatus::Paused;
        let right = if state.status_summary.is_empty() {
            format!("{} KiB", buffer.total_bytes() / 1024)
        } else {
            state.status_summary.clone()
        };

        let bar = StatusBar::new()
            .hints(console_hints(paused))
            .notice(state.notice())
            .right(right);

        frame.render_widget(bar, area);
    }
}

/// Format a record timestamp for display in local time
///
/// Falls back to the raw text when it is not RFC3339.
pub fn display_time(time_stamp: &str) -> String {
    match DateTime::parse_from_rfc3339(time_stamp) {
        Ok(parsed) => parsed
            .with_timezone(&Local)
            .format("%H:%M:%S%.3f")
            .to_string(),
        Err(_) => time_stamp.to_string(),
    }
}

/// One display line for a record, with search hits highlighted
pub fn record_line<'a>(item: &'a LogItem, term: Option<&str>, is_current: bool) -> Line<'a> {
    if item.is_missing_data() {
        return Line::from(Span::styled(
            format!("──── {} ────", MISSING_DATA_MESSAGE),
            Theme::gap(),
        ));
    }

    let mut spans = vec![
        Span::styled(display_time(item.time_stamp()), Theme::timestamp()),
        Span::raw(" "),
    ];

    let hit_style = if is_current {
        Theme::search_match_current()
    } else {
        Theme::search_match()
    };
    spans.extend(highlight(item.log_data(), term, Theme::text(), hit_style));

    let line = Line::from(spans);
    if is_current {
        line.style(Theme::current_line())
    } else {
        line
    }
}

/// Split `text` into spans, styling each occurrence of `term`
fn highlight<'a>(text: &'a str, term: Option<&str>, base: Style, hit: Style) -> Vec<Span<'a>> {
    let Some(term) = term.filter(|t| !t.is_empty()) else {
        return vec![Span::styled(text, base)];
    };

    let mut spans = Vec::new();
    let mut last_end = 0;
    for (start, matched) in text.match_indices(term) {
        if start > last_end {
            spans.push(Span::styled(&text[last_end..start], base));
        }
        spans.push(Span::styled(matched, hit));
        last_end = start + matched.len();
    }
    if last_end < text.len() || spans.is_empty() {
        spans.push(Span::styled(&text[last_end..], base));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppState;
    use kubeconsole_logs::BufferConfig;
    use kubeconsole_types::ConsoleTarget;
    use ratatui::{Terminal, backend::TestBackend};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buf = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buf.area.height {
            for x in 0..buf.area.width {
                text.push_str(buf[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_highlight_splits_on_term() {
        let spans = highlight(
            "an error, another error",
            Some("error"),
            Theme::text(),
            Theme::search_match(),
        );
        let parts: Vec<&str> = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(parts, vec!["an ", "error", ", another ", "error"]);
        assert_eq!(spans[1].style, Theme::search_match());
    }

    #[test]
    fn test_highlight_without_term() {
        let spans = highlight("plain", None, Theme::text(), Theme::search_match());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "plain");

        let spans = highlight("plain", Some("zzz"), Theme::text(), Theme::search_match());
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_sentinel_renders_as_gap_marker() {
        let sentinel = LogItem::missing_data();
        let line = record_line(&sentinel, Some("missing"), false);
        assert_eq!(line.spans.len(), 1);
        assert!(line.spans[0].content.contains(MISSING_DATA_MESSAGE));
        assert_eq!(line.spans[0].style, Theme::gap());
    }

    #[test]
    fn test_display_time() {
        assert_eq!(display_time("not a time"), "not a time");
        assert_eq!(display_time(""), "");
        let shown = display_time("2024-01-15T10:30:00.123456789Z");
        assert_eq!(shown.len(), 12);
        assert!(shown.ends_with(".123"));
    }

    #[test]
    fn test_render_visible_window() {
        let mut buffer = BufferManager::new(BufferConfig::events());
        let items = (0..50)
            .map(|i| LogItem::new(format!("2024-01-15T10:30:{:02}Z", i), format!("line {}", i)))
            .collect();
        buffer.set(items);

        let mut state = AppState::new(ConsoleTarget::new("default".into(), "web-0".into()));
        let mut terminal = Terminal::new(TestBackend::new(80, 15)).unwrap();
        terminal
            .draw(|frame| ConsoleScreen::render(frame, &mut state, &buffer))
            .unwrap();

        // 15 rows: header 3, status 1, borders 2
        assert_eq!(state.viewport_height, 9);
        let text = screen_text(&terminal);
        assert!(text.contains("default/web-0"));
        assert!(text.contains("line 49"));
        assert!(text.contains("line 41"));
        assert!(!text.contains("line 40 "));
    }

    #[test]
    fn test_render_search_position() {
        let mut buffer = BufferManager::new(BufferConfig::events());
        buffer.set(vec![
            LogItem::new("2024-01-15T10:30:00Z", "boot"),
            LogItem::new("2024-01-15T10:30:01Z", "error one"),
            LogItem::new("2024-01-15T10:30:02Z", "error two"),
        ]);
        buffer.change_search_term("error");

        let mut state = AppState::new(ConsoleTarget::new("default".into(), "web-0".into()));
        state.search_term = Some("error".to_string());
        state.viewport_height = 10;
        assert!(state.step_match(&buffer, true));

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal
            .draw(|frame| ConsoleScreen::render(frame, &mut state, &buffer))
            .unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Term: error"));
        assert!(text.contains("1/2"));
    }
}
