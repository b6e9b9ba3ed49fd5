use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kubeconsole_types::{FetchStatus, LogItem};

use crate::manager::SharedBuffer;
use crate::status::StatusAggregator;

/// Default spacing between fetches
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default number of consecutive failures before a poller gives up
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// A place to fetch time-ordered batches of records from
pub trait LogSource: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the current window of records, oldest first
    ///
    /// `since` is the timestamp the window should start at; None asks for
    /// the source's default window.
    fn fetch(
        &self,
        since: Option<&str>,
    ) -> impl Future<Output = Result<Vec<LogItem>, Self::Error>> + Send;
}

/// How fetched batches are applied to the buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollMode {
    /// Stitch onto the buffered tail (logs)
    Merge,
    /// Replace the buffer wholesale (events)
    Replace,
}

#[derive(Clone, Debug)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

/// Result of a single poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Applied { fetched: usize, added: usize },
    Failed { consecutive: u32 },
    /// The failure cap was reached
    GaveUp,
}

/// Periodically fetches from a source into a shared buffer
pub struct Poller<S> {
    /// Status line name
    name: String,
    source: S,
    buffer: SharedBuffer,
    mode: PollMode,
    config: PollerConfig,
    status: StatusAggregator,
    failures: u32,
    fetch_status: watch::Sender<FetchStatus>,
}

impl<S: LogSource> Poller<S> {
    pub fn new(
        name: impl Into<String>,
        source: S,
        buffer: SharedBuffer,
        mode: PollMode,
        config: PollerConfig,
        status: StatusAggregator,
    ) -> Self {
        let (fetch_status, _) = watch::channel(FetchStatus::New);
        let poller = Self {
            name: name.into(),
            source,
            buffer,
            mode,
            config,
            status,
            failures: 0,
            fetch_status,
        };
        poller.report(FetchStatus::New, "waiting");
        poller
    }

    pub fn fetch_status(&self) -> FetchStatus {
        *self.fetch_status.borrow()
    }

    /// Window start for the next fetch
    fn since(&self) -> Option<String> {
        match self.mode {
            PollMode::Merge => self.buffer.lock().previous_second_timestamp(),
            PollMode::Replace => None,
        }
    }

    /// Fetch once and apply the result
    pub async fn poll_once(&mut self) -> PollOutcome {
        let since = self.since();
        match self.source.fetch(since.as_deref()).await {
            Ok(items) => self.apply(items),
            Err(err) => self.record_failure(&err),
        }
    }

    fn apply(&mut self, items: Vec<LogItem>) -> PollOutcome {
        self.failures = 0;
        let fetched = items.len();
        let (added, size) = {
            let mut buffer = self.buffer.lock();
            let added = match self.mode {
                PollMode::Merge => buffer.merge(items),
                PollMode::Replace => buffer.set(items),
            };
            (added, buffer.size())
        };

        debug!(poller = %self.name, fetched, added, size, "applied batch");
        self.report(
            FetchStatus::Running,
            &format!("{} lines, updated {}", size, Local::now().format("%H:%M:%S")),
        );
        PollOutcome::Applied { fetched, added }
    }

    fn record_failure(&mut self, err: &S::Error) -> PollOutcome {
        self.failures += 1;
        warn!(
            poller = %self.name,
            consecutive = self.failures,
            error = %err,
            "fetch failed"
        );

        if self.failures >= self.config.max_consecutive_failures {
            self.report(FetchStatus::Error, &format!("stopped: {}", err));
            PollOutcome::GaveUp
        } else {
            self.report(
                self.fetch_status(),
                &format!("retrying ({}/{})", self.failures, self.config.max_consecutive_failures),
            );
            PollOutcome::Failed {
                consecutive: self.failures,
            }
        }
    }

    fn report(&self, fetch_status: FetchStatus, detail: &str) {
        self.fetch_status.send_replace(fetch_status);
        self.status.set(
            &self.name,
            format!("{} {}: {}", self.name, fetch_status.as_str(), detail),
        );
    }

    /// Run the polling loop on a tokio task
    pub fn spawn(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let paused = Arc::new(AtomicBool::new(false));
        let status = self.fetch_status.subscribe();

        let task = {
            let cancel = cancel.clone();
            let paused = Arc::clone(&paused);
            tokio::spawn(self.run(cancel, paused))
        };

        PollerHandle {
            cancel,
            paused,
            status,
            task,
        }
    }

    async fn run(mut self, cancel: CancellationToken, paused: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if paused.load(Ordering::Relaxed) {
                if self.fetch_status() != FetchStatus::Paused {
                    self.report(FetchStatus::Paused, "polling suspended");
                }
                continue;
            }

            let since = self.since();
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.source.fetch(since.as_deref()) => result,
            };

            // A fetch that completes after pause is dropped, never half-applied
            if paused.load(Ordering::Relaxed) {
                debug!(poller = %self.name, "discarding fetch completed while paused");
                continue;
            }

            match result {
                Ok(items) => {
                    self.apply(items);
                }
                Err(err) => {
                    if self.record_failure(&err) == PollOutcome::GaveUp {
                        break;
                    }
                }
            }
        }
    }
}

/// Control handle for a spawned poller
pub struct PollerHandle {
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    status: watch::Receiver<FetchStatus>,
    task: tokio::task::JoinHandle<()>,
}

impl PollerHandle {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    /// Flip pause state; returns true if now paused
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Current status; a requested pause shows immediately
    pub fn status(&self) -> FetchStatus {
        let status = *self.status.borrow();
        if self.is_paused() && !status.is_terminal() {
            FetchStatus::Paused
        } else {
            status
        }
    }

    /// Check if the polling loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop polling
    pub fn stop(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
