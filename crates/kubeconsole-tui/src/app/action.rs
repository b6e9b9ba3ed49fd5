/// All possible actions in the console (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,

    /// Switch between the Logs and Events tabs
    SwitchTab,

    // Search input
    OpenSearch,
    CloseSearch,
    SearchInput(char),
    SearchBackspace,
    SearchClear,
    ApplySearch,
    ClearSearch,

    // Match navigation
    NextMatch,
    PrevMatch,

    // Buffer control
    TogglePause,
    ClearLogs,

    // Scrolling
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,
    ToggleAutoScroll,
}
