use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::Action;

/// A key combination
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn shift(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::SHIFT,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

/// Context for keybindings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    Console,
    SearchInput,
    Help,
}

/// Keybinding configuration
pub struct KeyBindings {
    bindings: HashMap<KeyContext, HashMap<KeyBinding, Action>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();

        let mut global = HashMap::new();
        global.insert(KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit);
        global.insert(KeyBinding::new(KeyCode::Char('q')), Action::Quit);
        bindings.insert(KeyContext::Global, global);

        // Console bindings - less-like navigation
        let mut console = HashMap::new();
        console.insert(KeyBinding::new(KeyCode::Tab), Action::SwitchTab);
        console.insert(KeyBinding::shift(KeyCode::BackTab), Action::SwitchTab);
        console.insert(KeyBinding::new(KeyCode::Char('/')), Action::OpenSearch);
        console.insert(KeyBinding::new(KeyCode::Esc), Action::ClearSearch);
        console.insert(KeyBinding::new(KeyCode::Char('n')), Action::NextMatch);
        console.insert(KeyBinding::shift(KeyCode::Char('N')), Action::PrevMatch);
        console.insert(KeyBinding::new(KeyCode::Char(' ')), Action::TogglePause);
        console.insert(KeyBinding::new(KeyCode::Char('c')), Action::ClearLogs);
        console.insert(KeyBinding::new(KeyCode::Char('f')), Action::ToggleAutoScroll);
        console.insert(KeyBinding::new(KeyCode::Char('j')), Action::ScrollDown(1));
        console.insert(KeyBinding::new(KeyCode::Down), Action::ScrollDown(1));
        console.insert(KeyBinding::new(KeyCode::Char('k')), Action::ScrollUp(1));
        console.insert(KeyBinding::new(KeyCode::Up), Action::ScrollUp(1));
        console.insert(KeyBinding::ctrl(KeyCode::Char('d')), Action::PageDown);
        console.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::PageUp);
        console.insert(KeyBinding::new(KeyCode::PageDown), Action::PageDown);
        console.insert(KeyBinding::new(KeyCode::PageUp), Action::PageUp);
        console.insert(KeyBinding::new(KeyCode::Char('g')), Action::ScrollToTop);
        console.insert(KeyBinding::shift(KeyCode::Char('G')), Action::ScrollToBottom);
        console.insert(KeyBinding::new(KeyCode::Home), Action::ScrollToTop);
        console.insert(KeyBinding::new(KeyCode::End), Action::ScrollToBottom);
        bindings.insert(KeyContext::Console, console);

        // Search bar is taking input
        let mut search = HashMap::new();
        search.insert(KeyBinding::new(KeyCode::Enter), Action::ApplySearch);
        search.insert(KeyBinding::new(KeyCode::Esc), Action::CloseSearch);
        search.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::CloseSearch);
        search.insert(KeyBinding::new(KeyCode::Backspace), Action::SearchBackspace);
        search.insert(KeyBinding::ctrl(KeyCode::Char('u')), Action::SearchClear);
        bindings.insert(KeyContext::SearchInput, search);

        let mut help = HashMap::new();
        help.insert(KeyBinding::new(KeyCode::Esc), Action::ToggleHelp);
        bindings.insert(KeyContext::Help, help);

        Self { bindings }
    }

    /// Look up action for key event in given context
    pub fn get_action(&self, context: KeyContext, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&context)
            .and_then(|context_bindings| context_bindings.get(&binding))
        {
            return Some(action.clone());
        }

        // Search input swallows everything else as text
        if context == KeyContext::SearchInput {
            return match key.code {
                KeyCode::Char(c)
                    if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
                {
                    Some(Action::SearchInput(c))
                }
                _ => None,
            };
        }

        self.bindings
            .get(&KeyContext::Global)?
            .get(&binding)
            .cloned()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}
