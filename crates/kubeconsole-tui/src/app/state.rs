use std::time::{Duration, Instant};

use kubeconsole_logs::{BufferManager, FifoThrottler, MatchUpdate};
use kubeconsole_types::{BufferType, ConsoleTarget, FetchStatus};

/// Minimum spacing between two notices
pub const NOTICE_INTERVAL: Duration = Duration::from_millis(1500);

/// How long a notice stays in the status bar
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// View state of one buffer tab
#[derive(Clone, Debug)]
pub struct TabState {
    /// First visible index while not following
    pub scroll_offset: usize,

    /// Keep the newest records in view
    pub auto_scroll: bool,

    /// Match focused with n/N
    pub current_match: Option<usize>,

    /// Match count from the last buffer notification
    pub num_matches: usize,

    /// Buffer size from the last buffer notification
    pub size: usize,

    pub fetch_status: FetchStatus,
}

impl Default for TabState {
    fn default() -> Self {
        Self {
            scroll_offset: 0,
            auto_scroll: true,
            current_match: None,
            num_matches: 0,
            size: 0,
            fetch_status: FetchStatus::New,
        }
    }
}

impl TabState {
    /// Index of the first visible record for a viewport of `height` lines
    pub fn visible_start(&self, size: usize, height: usize) -> usize {
        let max = size.saturating_sub(height);
        if self.auto_scroll {
            max
        } else {
            self.scroll_offset.min(max)
        }
    }

    pub fn scroll_up(&mut self, lines: usize, size: usize, height: usize) {
        let start = self.visible_start(size, height);
        self.auto_scroll = false;
        self.scroll_offset = start.saturating_sub(lines);
    }

    /// Scrolling onto the last page resumes following
    pub fn scroll_down(&mut self, lines: usize, size: usize, height: usize) {
        let max = size.saturating_sub(height);
        let start = self.visible_start(size, height);
        self.scroll_offset = start.saturating_add(lines).min(max);
        if self.scroll_offset == max {
            self.auto_scroll = true;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.auto_scroll = false;
        self.scroll_offset = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.auto_scroll = true;
    }

    /// Mark `index` as the focused match and scroll it into view
    pub fn focus(&mut self, index: usize, size: usize, height: usize) {
        self.current_match = Some(index);
        let start = self.visible_start(size, height);
        if index < start || index >= start + height.max(1) {
            self.auto_scroll = false;
            self.scroll_offset = index.saturating_sub(height / 2);
        }
    }

    pub fn apply_update(&mut self, update: &MatchUpdate) {
        self.num_matches = update.num_matches;
        self.size = update.size;
        if let Some(current) = self.current_match
            && update.matches.binary_search(&current).is_err()
        {
            self.current_match = None;
        }
    }

    /// Forget scroll and focus, keeping the fetch status
    pub fn reset(&mut self) {
        *self = Self {
            fetch_status: self.fetch_status,
            ..Self::default()
        };
    }
}

/// Main application state
pub struct AppState {
    pub target: ConsoleTarget,

    pub active_tab: BufferType,
    pub logs: TabState,
    pub events: TabState,

    /// Whether the search bar is taking input
    pub search_active: bool,
    pub search_input: String,

    /// Term applied to both buffers
    pub search_term: Option<String>,

    pub help_visible: bool,
    pub should_quit: bool,

    /// Joined poller status lines
    pub status_summary: String,

    /// Records visible in the content area, updated on render
    pub viewport_height: usize,

    notices: FifoThrottler<String>,
    notice: Option<(String, Instant)>,
}

impl AppState {
    pub fn new(target: ConsoleTarget) -> Self {
        Self {
            target,
            active_tab: BufferType::Logs,
            logs: TabState::default(),
            events: TabState::default(),
            search_active: false,
            search_input: String::new(),
            search_term: None,
            help_visible: false,
            should_quit: false,
            status_summary: String::new(),
            viewport_height: 1,
            notices: FifoThrottler::new(NOTICE_INTERVAL),
            notice: None,
        }
    }

    pub fn tab(&self) -> &TabState {
        self.tab_for(self.active_tab)
    }

    pub fn tab_mut(&mut self) -> &mut TabState {
        self.tab_for_mut(self.active_tab)
    }

    pub fn tab_for(&self, buffer_type: BufferType) -> &TabState {
        match buffer_type {
            BufferType::Logs => &self.logs,
            BufferType::Events => &self.events,
        }
    }

    pub fn tab_for_mut(&mut self, buffer_type: BufferType) -> &mut TabState {
        match buffer_type {
            BufferType::Logs => &mut self.logs,
            BufferType::Events => &mut self.events,
        }
    }

    pub fn switch_tab(&mut self) {
        self.active_tab = self.active_tab.toggle();
    }

    /// Route a listener notification to its tab
    pub fn apply_update(&mut self, update: &MatchUpdate) {
        self.tab_for_mut(update.buffer_type).apply_update(update);
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Start search input, prefilled with the applied term
    pub fn start_search(&mut self) {
        self.search_active = true;
        self.search_input = self.search_term.clone().unwrap_or_default();
    }

    /// Leave search input without changing the applied term
    pub fn cancel_search(&mut self) {
        self.search_active = false;
        self.search_input.clear();
    }

    pub fn search_input_char(&mut self, c: char) {
        self.search_input.push(c);
    }

    pub fn search_input_backspace(&mut self) {
        self.search_input.pop();
    }

    pub fn search_input_clear(&mut self) {
        self.search_input.clear();
    }

    /// Take the input as the new term
    ///
    /// Returns the term to hand to the buffers; empty ends the search.
    pub fn apply_search(&mut self) -> String {
        self.search_active = false;
        let term = std::mem::take(&mut self.search_input);
        self.search_term = (!term.is_empty()).then(|| term.clone());
        self.logs.current_match = None;
        self.events.current_match = None;
        term
    }

    /// Drop the applied term; returns false if there was none
    pub fn clear_search(&mut self) -> bool {
        if self.search_term.take().is_none() {
            return false;
        }
        self.logs.current_match = None;
        self.events.current_match = None;
        true
    }

    /// Focus the next (or previous) match of the active tab
    ///
    /// Without a focused match the search starts from the visible window.
    /// Returns false if the buffer has no matches.
    pub fn step_match(&mut self, buffer: &BufferManager, forward: bool) -> bool {
        let size = buffer.size();
        let height = self.viewport_height.max(1);

        let target = {
            let tab = self.tab();
            let start = tab.visible_start(size, height);
            match (tab.current_match, forward) {
                (Some(current), true) => buffer.next_match(current),
                (Some(current), false) => buffer.previous_match(current),
                (None, true) if start == 0 && buffer.match_ordinal(0).is_some() => Some(0),
                (None, true) => buffer.next_match(start.saturating_sub(1)),
                (None, false) => buffer.previous_match(start + height),
            }
        };

        match target {
            Some(index) => {
                self.tab_mut().focus(index, size, height);
                true
            }
            None => false,
        }
    }

    /// "k/n" position of the focused match
    pub fn match_position(&self, buffer: &BufferManager) -> Option<(usize, usize)> {
        let ordinal = buffer.match_ordinal(self.tab().current_match?)?;
        Some((ordinal, buffer.num_matches()))
    }

    // ------------------------------------------------------------------
    // Scrolling
    // ------------------------------------------------------------------

    pub fn scroll_up(&mut self, lines: usize, size: usize) {
        let height = self.viewport_height;
        self.tab_mut().scroll_up(lines, size, height);
    }

    pub fn scroll_down(&mut self, lines: usize, size: usize) {
        let height = self.viewport_height;
        self.tab_mut().scroll_down(lines, size, height);
    }

    pub fn page_up(&mut self, size: usize) {
        self.scroll_up(self.viewport_height.max(1), size);
    }

    pub fn page_down(&mut self, size: usize) {
        self.scroll_down(self.viewport_height.max(1), size);
    }

    /// Flip follow mode; returns true if now following
    pub fn toggle_auto_scroll(&mut self, size: usize) -> bool {
        let height = self.viewport_height;
        let tab = self.tab_mut();
        if tab.auto_scroll {
            tab.scroll_offset = tab.visible_start(size, height);
            tab.auto_scroll = false;
        } else {
            tab.auto_scroll = true;
        }
        tab.auto_scroll
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    /// Queue a short message for the status bar
    pub fn push_notice(&mut self, message: impl Into<String>) {
        self.notices.push(message.into());
    }

    /// Promote queued notices and expire the shown one
    pub fn tick(&mut self, now: Instant) {
        if let Some(next) = self.notices.pop_ready(now) {
            self.notice = Some((next, now));
        } else if self
            .notice
            .as_ref()
            .is_some_and(|(_, shown)| now.duration_since(*shown) >= NOTICE_TTL)
        {
            self.notice = None;
        }
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|(message, _)| message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeconsole_logs::BufferConfig;
    use kubeconsole_types::LogItem;

    fn target() -> ConsoleTarget {
        ConsoleTarget::new("default".to_string(), "web-0".to_string())
    }

    /// Buffer of `n` lines where every third line says "error"
    fn buffer(n: usize) -> BufferManager {
        let mut buffer = BufferManager::new(BufferConfig::events());
        let items = (0..n)
            .map(|i| {
                let text = if i % 3 == 0 { "error" } else { "ok" };
                LogItem::new(format!("2024-01-15T10:30:{:02}Z", i % 60), text)
            })
            .collect();
        buffer.set(items);
        buffer
    }

    #[test]
    fn test_switch_tab() {
        let mut state = AppState::new(target());
        assert_eq!(state.active_tab, BufferType::Logs);
        state.logs.auto_scroll = false;

        state.switch_tab();
        assert_eq!(state.active_tab, BufferType::Events);
        assert!(state.tab().auto_scroll);

        state.switch_tab();
        assert!(!state.tab().auto_scroll);
    }

    #[test]
    fn test_search_apply_and_clear() {
        let mut state = AppState::new(target());
        state.start_search();
        for c in "panic".chars() {
            state.search_input_char(c);
        }
        state.search_input_backspace();
        assert_eq!(state.apply_search(), "pani");
        assert_eq!(state.search_term.as_deref(), Some("pani"));
        assert!(!state.search_active);

        // Reopening starts from the applied term
        state.start_search();
        assert_eq!(state.search_input, "pani");
        state.search_input_clear();
        assert_eq!(state.apply_search(), "");
        assert_eq!(state.search_term, None);
        assert!(!state.clear_search());
    }

    #[test]
    fn test_scroll_follows_at_bottom() {
        let mut tab = TabState::default();
        assert_eq!(tab.visible_start(100, 10), 90);

        tab.scroll_up(5, 100, 10);
        assert!(!tab.auto_scroll);
        assert_eq!(tab.visible_start(100, 10), 85);

        // New records do not move a paused view
        assert_eq!(tab.visible_start(150, 10), 85);

        tab.scroll_down(100, 150, 10);
        assert!(tab.auto_scroll);
        assert_eq!(tab.visible_start(150, 10), 140);
    }

    #[test]
    fn test_short_buffer_starts_at_top() {
        let mut tab = TabState::default();
        assert_eq!(tab.visible_start(3, 10), 0);
        tab.scroll_to_top();
        tab.scroll_down(1, 3, 10);
        assert!(tab.auto_scroll);
    }

    #[test]
    fn test_step_match_wraps() {
        let mut buffer = buffer(10);
        buffer.change_search_term("error");
        let mut state = AppState::new(target());
        state.viewport_height = 4;
        state.tab_mut().scroll_to_top();

        assert!(state.step_match(&buffer, true));
        assert_eq!(state.tab().current_match, Some(0));
        assert_eq!(state.match_position(&buffer), Some((1, 4)));

        assert!(state.step_match(&buffer, true));
        assert!(state.step_match(&buffer, true));
        assert!(state.step_match(&buffer, true));
        assert_eq!(state.tab().current_match, Some(9));
        assert_eq!(state.tab().visible_start(10, 4), 6);

        assert!(state.step_match(&buffer, true));
        assert_eq!(state.tab().current_match, Some(0));

        assert!(state.step_match(&buffer, false));
        assert_eq!(state.tab().current_match, Some(9));
    }

    #[test]
    fn test_step_match_starts_from_view() {
        let mut buffer = buffer(30);
        buffer.change_search_term("error");
        let mut state = AppState::new(target());
        state.viewport_height = 5;

        // Following: the view shows 25..30, last match before its end is 27
        assert!(state.step_match(&buffer, false));
        assert_eq!(state.tab().current_match, Some(27));
    }

    #[test]
    fn test_step_match_without_matches() {
        let buffer = buffer(10);
        let mut state = AppState::new(target());
        assert!(!state.step_match(&buffer, true));
        assert_eq!(state.tab().current_match, None);
    }

    #[test]
    fn test_update_drops_stale_focus() {
        let mut state = AppState::new(target());
        state.logs.current_match = Some(4);

        state.apply_update(&MatchUpdate {
            buffer_type: BufferType::Logs,
            num_matches: 2,
            matches: vec![1, 4],
            size: 10,
        });
        assert_eq!(state.logs.current_match, Some(4));
        assert_eq!(state.logs.num_matches, 2);

        state.apply_update(&MatchUpdate {
            buffer_type: BufferType::Logs,
            num_matches: 1,
            matches: vec![1],
            size: 10,
        });
        assert_eq!(state.logs.current_match, None);
        assert_eq!(state.events.num_matches, 0);
    }

    #[test]
    fn test_notices_are_spaced_and_expire() {
        let mut state = AppState::new(target());
        let start = Instant::now();
        state.push_notice("logs paused");
        state.push_notice("logs resumed");

        state.tick(start);
        assert_eq!(state.notice(), Some("logs paused"));

        state.tick(start + Duration::from_millis(100));
        assert_eq!(state.notice(), Some("logs paused"));

        state.tick(start + NOTICE_INTERVAL);
        assert_eq!(state.notice(), Some("logs resumed"));

        state.tick(start + NOTICE_INTERVAL + NOTICE_TTL);
        assert_eq!(state.notice(), None);
    }

    #[test]
    fn test_toggle_auto_scroll_keeps_position() {
        let mut state = AppState::new(target());
        state.viewport_height = 10;
        assert!(!state.toggle_auto_scroll(50));
        assert_eq!(state.tab().scroll_offset, 40);
        assert!(state.toggle_auto_scroll(50));
    }
}
