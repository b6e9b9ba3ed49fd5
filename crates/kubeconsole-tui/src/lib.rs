//! TUI components for kubeconsole
//!
//! This crate provides the terminal console over the log and event buffers:
//! state, keybindings, terminal event handling and rendering.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{Action, AppState, TabState};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{HelpOverlay, StatusBar};
pub use ui::screens::ConsoleScreen;
pub use ui::{Layout, Theme};
