//! Shared types for kubeconsole
//!
//! This crate contains data structures used across multiple kubeconsole crates.

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

// ============================================================================
// Log Types
// ============================================================================

/// Payload of the placeholder record that marks a gap between two fetches
pub const MISSING_DATA_MESSAGE: &str = "... missing data ...";

/// A single buffered log or event record
///
/// Fields are private so an item cannot change once it is buffered; the
/// byte size used for budget accounting is derived from them on demand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogItem {
    #[serde(rename = "timeStamp")]
    time_stamp: String,

    #[serde(rename = "logData")]
    log_data: String,
}

impl LogItem {
    pub fn new(time_stamp: impl Into<String>, log_data: impl Into<String>) -> Self {
        Self {
            time_stamp: time_stamp.into(),
            log_data: log_data.into(),
        }
    }

    /// The gap sentinel (empty timestamp, fixed payload)
    pub fn missing_data() -> Self {
        Self::new(String::new(), MISSING_DATA_MESSAGE)
    }

    /// ISO-8601 timestamp as delivered by the source
    pub fn time_stamp(&self) -> &str {
        &self.time_stamp
    }

    /// Raw record text
    pub fn log_data(&self) -> &str {
        &self.log_data
    }

    /// Bytes charged against the buffer budget
    pub fn byte_size(&self) -> usize {
        self.time_stamp.len() + self.log_data.len()
    }

    /// Check if this is the gap sentinel
    pub fn is_missing_data(&self) -> bool {
        self.time_stamp.is_empty() && self.log_data == MISSING_DATA_MESSAGE
    }
}

/// Which of the two console buffers a notification refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BufferType {
    #[default]
    Logs,
    Events,
}

impl BufferType {
    /// Tab label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Logs => "Logs",
            Self::Events => "Events",
        }
    }

    /// The other tab
    pub fn toggle(&self) -> Self {
        match self {
            Self::Logs => Self::Events,
            Self::Events => Self::Logs,
        }
    }
}

// ============================================================================
// Fetch Types
// ============================================================================

/// Lifecycle of a polling loop as seen by the console
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FetchStatus {
    /// Not polled yet
    #[default]
    New,
    Running,
    Paused,
    /// Gave up after too many consecutive failures
    Error,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Running => "live",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }

    /// Get display color for this status
    pub fn color(&self) -> Color {
        match self {
            Self::New => Color::DarkGray,
            Self::Running => Color::Green,
            Self::Paused => Color::Yellow,
            Self::Error => Color::Red,
        }
    }

    /// Terminal states are not left without a restart
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error)
    }
}

// ============================================================================
// Kubernetes Target
// ============================================================================

/// The container whose logs and events the console follows
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleTarget {
    pub context: Option<String>,
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
}

impl ConsoleTarget {
    pub fn new(namespace: String, pod: String) -> Self {
        Self {
            context: None,
            namespace,
            pod,
            container: None,
        }
    }

    /// Short "namespace/pod[/container]" label for headers
    pub fn label(&self) -> String {
        match &self.container {
            Some(container) => format!("{}/{}/{}", self.namespace, self.pod, container),
            None => format!("{}/{}", self.namespace, self.pod),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_counts_both_fields() {
        let item = LogItem::new("2024-01-15T10:30:00.1Z", "hello");
        assert_eq!(item.byte_size(), 22 + 5);
    }

    #[test]
    fn test_missing_data_sentinel() {
        let sentinel = LogItem::missing_data();
        assert!(sentinel.is_missing_data());
        assert_eq!(sentinel.log_data(), MISSING_DATA_MESSAGE);
        assert_eq!(sentinel, LogItem::missing_data());

        let lookalike = LogItem::new("2024-01-15T10:30:00Z", MISSING_DATA_MESSAGE);
        assert!(!lookalike.is_missing_data());
    }

    #[test]
    fn test_log_item_wire_names() {
        let item: LogItem =
            serde_json::from_str(r#"{"timeStamp":"2024-01-15T10:30:00Z","logData":"x"}"#)
                .unwrap();
        assert_eq!(item.time_stamp(), "2024-01-15T10:30:00Z");
        assert_eq!(item.log_data(), "x");
    }

    #[test]
    fn test_target_label() {
        let mut target = ConsoleTarget::new("default".to_string(), "web-0".to_string());
        assert_eq!(target.label(), "default/web-0");
        target.container = Some("app".to_string());
        assert_eq!(target.label(), "default/web-0/app");
    }
}
