use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use kubeconsole_types::{BufferType, LogItem};

use crate::chunked::ChunkedBuffer;
use crate::gates::{Clock, LeadingLimiter, SystemClock, TrailingDebouncer};
use crate::merge::{compare_seconds, compare_stamps, plan_merge};
use crate::search::SearchIndex;

/// Default byte budget for the log buffer (4 MiB)
pub const DEFAULT_LOG_BUDGET_BYTES: usize = 4 * 1024 * 1024;

/// Default byte budget for the event buffer (1 MiB)
pub const DEFAULT_EVENT_BUDGET_BYTES: usize = 1024 * 1024;

/// Default items per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default spacing between match notifications
pub const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_millis(100);

/// Construction parameters for a buffer manager
#[derive(Clone, Debug)]
pub struct BufferConfig {
    pub max_buffer_size_bytes: usize,
    pub chunk_size: usize,
    pub buffer_type: BufferType,
    /// Zero delivers every notification synchronously
    pub notify_interval: Duration,
}

impl BufferConfig {
    pub fn logs() -> Self {
        Self {
            max_buffer_size_bytes: DEFAULT_LOG_BUDGET_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_type: BufferType::Logs,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
        }
    }

    pub fn events() -> Self {
        Self {
            max_buffer_size_bytes: DEFAULT_EVENT_BUDGET_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_type: BufferType::Events,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
        }
    }
}

/// Search state pushed to listeners after a mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchUpdate {
    pub buffer_type: BufferType,
    pub num_matches: usize,
    pub matches: Vec<usize>,
    /// Buffer size at the time of the update
    pub size: usize,
}

/// Handle returned by `add_listener`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&MatchUpdate) + Send>;

/// Buffer manager shared between a poller task and the console
pub type SharedBuffer = Arc<Mutex<BufferManager>>;

/// Windowed, searchable, gap-annotated buffer of log or event records
///
/// Every mutating call updates the chunked buffer, evicts over-budget
/// chunks and adjusts the search index before it returns, so readers never
/// see a match index that points at an evicted item.
pub struct BufferManager {
    buffer: ChunkedBuffer,
    search: SearchIndex,
    buffer_type: BufferType,

    /// Last timestamp dropped by `clear_logs`; older fetched lines stay out
    cleared_at: Option<String>,

    /// Registered observers
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,

    /// Leading edge of the notification gate
    limiter: LeadingLimiter,
    /// Trailing edge of the notification gate
    debouncer: TrailingDebouncer,
    clock: Arc<dyn Clock>,
}

impl BufferManager {
    pub fn new(config: BufferConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager whose notification gate reads the given clock
    pub fn with_clock(config: BufferConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buffer: ChunkedBuffer::new(config.max_buffer_size_bytes, config.chunk_size),
            search: SearchIndex::new(),
            buffer_type: config.buffer_type,
            cleared_at: None,
            listeners: Vec::new(),
            next_listener_id: 0,
            limiter: LeadingLimiter::new(config.notify_interval),
            debouncer: TrailingDebouncer::new(config.notify_interval),
            clock,
        }
    }

    /// Wrap in the shared handle used by pollers and the console
    pub fn into_shared(self) -> SharedBuffer {
        Arc::new(Mutex::new(self))
    }

    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    /// Merge a freshly fetched batch of logs
    ///
    /// Returns the number of new (non-sentinel) items appended; zero means
    /// the batch was already buffered.
    pub fn merge(&mut self, mut items: Vec<LogItem>) -> usize {
        if let Some(cleared_at) = &self.cleared_at {
            items.retain(|item| compare_stamps(item.time_stamp(), cleared_at).is_gt());
        }
        let plan = plan_merge(&self.buffer, items);
        if plan.is_empty() {
            return 0;
        }

        let added = plan.added();
        if plan.gap {
            debug!(buffer = ?self.buffer_type, added, "gap detected, inserting sentinel");
        }
        self.append(plan.into_items());
        self.notify();
        added
    }

    /// Replace the contents wholesale (events); returns the new size
    pub fn set(&mut self, items: Vec<LogItem>) -> usize {
        self.cleared_at = None;
        self.buffer.clear();
        self.search.on_clear();
        self.append(items);
        self.notify();
        self.buffer.len()
    }

    fn append(&mut self, items: Vec<LogItem>) {
        self.search.on_append(&items);
        let evicted = self.buffer.append_many(items);
        if evicted > 0 {
            debug!(
                buffer = ?self.buffer_type,
                evicted,
                total_bytes = self.buffer.total_bytes(),
                "evicted chunks over budget"
            );
            self.search.on_evict(evicted);
        }
    }

    /// Item at a flat index
    pub fn get(&self, index: usize) -> Option<&LogItem> {
        self.buffer.get(index)
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.buffer.total_bytes()
    }

    /// Drop all items; the search term stays active
    ///
    /// The newest dropped timestamp is kept as the fetch cursor so cleared
    /// lines are not merged back in by the next poll.
    pub fn clear_logs(&mut self) {
        let last = self.stamped().next().map(|item| item.time_stamp().to_string());
        if last.is_some() {
            self.cleared_at = last;
        }
        self.buffer.clear();
        self.search.on_clear();
        self.notify();
    }

    /// Set the search term and rescan; an empty term ends the search
    pub fn change_search_term(&mut self, term: &str) {
        self.search.change_term(term, self.buffer.iter());
        self.notify();
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.term()
    }

    pub fn num_matches(&self) -> usize {
        self.search.num_matches()
    }

    /// Matching indexes, ascending
    pub fn matching_indexes(&self) -> Vec<usize> {
        self.search.matching_indexes()
    }

    pub fn next_match(&self, index: usize) -> Option<usize> {
        self.search.next_match(index)
    }

    pub fn previous_match(&self, index: usize) -> Option<usize> {
        self.search.previous_match(index)
    }

    pub fn match_ordinal(&self, index: usize) -> Option<usize> {
        self.search.match_ordinal(index)
    }

    /// Timestamp of the item just before the final whole-second group
    ///
    /// The poller asks for the next window starting here so that the last
    /// buffered second is fetched again and can anchor the merge. Falls back
    /// to the last cleared timestamp while fewer than two distinct seconds
    /// are buffered, and to None when nothing was cleared.
    pub fn previous_second_timestamp(&self) -> Option<String> {
        let mut stamped = self.stamped();
        let previous = stamped.next().and_then(|last| {
            stamped.find(|item| compare_seconds(item.time_stamp(), last.time_stamp()).is_ne())
        });
        previous
            .map(|item| item.time_stamp().to_string())
            .or_else(|| self.cleared_at.clone())
    }

    /// Real items that carry a timestamp, newest first
    fn stamped(&self) -> impl Iterator<Item = &LogItem> {
        self.buffer
            .iter_rev()
            .filter(|item| !item.is_missing_data() && !item.time_stamp().is_empty())
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Register an observer for match updates
    ///
    /// Observers run while the manager is borrowed and must not call back
    /// into it.
    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&MatchUpdate) + Send + 'static,
    {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was not registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Snapshot of the current search state
    pub fn match_update(&self) -> MatchUpdate {
        MatchUpdate {
            buffer_type: self.buffer_type,
            num_matches: self.search.num_matches(),
            matches: self.search.matching_indexes(),
            size: self.buffer.len(),
        }
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let now = self.clock.now();
        if self.limiter.try_acquire(now) {
            self.debouncer.cancel();
            self.emit();
        } else {
            self.debouncer.trigger(now);
        }
    }

    /// Deliver a held-back notification once its quiet period has passed
    ///
    /// Returns true if listeners were called.
    pub fn flush_notifications(&mut self) -> bool {
        if self.debouncer.poll(self.clock.now()) {
            self.limiter.try_acquire(self.clock.now());
            self.emit();
            true
        } else {
            false
        }
    }

    fn emit(&mut self) {
        let update = self.match_update();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&update);
        }
    }
}
