mod console;

pub use console::{ConsoleScreen, display_time, record_line};
