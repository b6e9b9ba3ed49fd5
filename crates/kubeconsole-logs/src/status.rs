use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned by `StatusAggregator::subscribe`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Inner {
    /// (name, status) in registration order
    entries: Vec<(String, String)>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl Inner {
    fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|(_, status)| status.as_str())
            .collect::<Vec<_>>()
            .join(" · ")
    }

    fn publish(&self) {
        if self.subscribers.is_empty() {
            return;
        }
        let summary = self.summary();
        for (_, subscriber) in &self.subscribers {
            subscriber(&summary);
        }
    }
}

/// Human-readable polling status, one line per named producer
///
/// Constructed by the console and handed to each poller; clones share the
/// same state.
#[derive(Clone, Default)]
pub struct StatusAggregator {
    inner: Arc<Mutex<Inner>>,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or register) the status for a producer
    pub fn set(&self, name: &str, status: impl Into<String>) {
        let status = status.into();
        let mut inner = self.inner.lock();
        match inner.entries.iter().position(|(n, _)| n == name) {
            Some(pos) if inner.entries[pos].1 == status => return,
            Some(pos) => inner.entries[pos].1 = status,
            None => inner.entries.push((name.to_string(), status)),
        }
        inner.publish();
    }

    /// Unregister a producer
    pub fn remove(&self, name: &str) {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|(n, _)| n != name);
        if inner.entries.len() != before {
            inner.publish();
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, status)| status.clone())
    }

    /// All statuses joined in registration order
    pub fn summary(&self) -> String {
        self.inner.lock().summary()
    }

    /// Call `subscriber` with the new summary after every change
    ///
    /// Subscribers run under the aggregator lock and must not call back into it.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
        inner.subscribers.len() != before
    }
}

impl std::fmt::Debug for StatusAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StatusAggregator")
            .field("entries", &inner.entries)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}
