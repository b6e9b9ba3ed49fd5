//! Log processing for kubeconsole
//!
//! This crate provides the byte-budgeted chunked buffer, batch merging with
//! gap detection, incremental search, and the polling loop that feeds them.

mod chunked;
mod gates;
mod manager;
mod merge;
mod parser;
mod poller;
mod search;
mod status;

pub use chunked::ChunkedBuffer;
pub use gates::{Clock, FifoThrottler, LeadingLimiter, ManualClock, SystemClock, TrailingDebouncer};
pub use manager::{
    BufferConfig, BufferManager, ListenerId, MatchUpdate, SharedBuffer, DEFAULT_CHUNK_SIZE,
    DEFAULT_EVENT_BUDGET_BYTES, DEFAULT_LOG_BUDGET_BYTES, DEFAULT_NOTIFY_INTERVAL,
};
pub use merge::{compare_seconds, compare_stamps, plan_merge, whole_second, MergePlan};
pub use parser::LogParser;
pub use poller::{
    LogSource, PollMode, PollOutcome, Poller, PollerConfig, PollerHandle, DEFAULT_MAX_FAILURES,
    DEFAULT_POLL_INTERVAL,
};
pub use search::SearchIndex;
pub use status::{StatusAggregator, SubscriptionId};

// Re-export types used in our public API
pub use kubeconsole_types::{BufferType, FetchStatus, LogItem, MISSING_DATA_MESSAGE};
